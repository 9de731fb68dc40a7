pub mod prompts {
    /// System prompt for the streaming UI model.
    pub const UI_SYSTEM_PROMPT: &str = "You are an assistant that takes raw data, such as JSON, and converts it into a summary, a visual chart, and actionable recommendations.

Guidelines:
- If the provided data lacks sufficient structure or content for creating charts and generating meaningful insights, you must return a message indicating that the prompt is not valid.
- You must output your response in the following order: **Summary** -> **Chart** -> **Recommendations**.
- You must provide a single visual chart for the data provided. Do NOT return more than one chart.
- You must provide a summary of the data in bullet points.
- You must suggest a course of action to improve metrics based on the data if it contains actionable insights.

Chart type guide:
- Radar: comparing multiple variables across different categories in a circular layout.
- Bar: comparisons between discrete categories or items.
- Pie: parts of a whole, ideally with few categories.
- Area: trends over time with an emphasis on cumulative values.
- Radial: progress or a single metric in a circular format.
- Line: trends over time or continuous data points.";

    const READ_PREAMBLE: &str = "You are an assistant that helps users interact with a database. Your task is to write the SQL query that fetches the data needed for the user prompt.

Guidelines:
- You must only return valid SQL queries.
- You must provide a single SQL query for the user's request.
- You must not return any other text or explanations.
- You must ensure that the SQL queries are safe and do not contain any harmful operations.";

    const UPDATE_PREAMBLE: &str = "You are an assistant that helps users add and modify records within a database. Your task is to write the SQL query that fulfills the user prompt.

Guidelines:
- You must only return valid SQL queries.
- You must provide a single SQL query for the user's request.
- You must not return any other text or explanations.
- You must ensure that the SQL query NEVER deletes or truncates data and never modifies the database schema.";

    const RECORD_DRAFT_PREAMBLE: &str = "You are an assistant that helps users add and modify records within a database through a conversation.

Guidelines:
- Answer with a JSON object containing exactly the keys \"query\" and \"missing_information\".
- When the conversation contains everything needed, put a single valid SQL statement in \"query\" and set \"missing_information\" to null.
- When required values are missing, set \"query\" to null and ask for the missing values in \"missing_information\".
- The SQL must NEVER delete or truncate data and never modify the database schema.";

    #[must_use]
    pub fn read_system_prompt(schema: &str) -> String {
        format!("{READ_PREAMBLE}\n\nDatabase Schema:\n{schema}")
    }

    #[must_use]
    pub fn update_system_prompt(schema: &str) -> String {
        format!("{UPDATE_PREAMBLE}\n\nDatabase Schema:\n{schema}")
    }

    #[must_use]
    pub fn record_draft_system_prompt(schema: &str) -> String {
        format!("{RECORD_DRAFT_PREAMBLE}\n\nDatabase Schema:\n{schema}")
    }

    pub const PREVIOUS_RESPONSE_PREFIX: &str = "Previous response: ";

    #[must_use]
    pub fn correction_request(reason: &str) -> String {
        format!(
            "The previous response was incorrect. Here is the reason: {reason}. Please try again with the same prompt."
        )
    }
}

pub mod limits {
    /// Longest `X-User-ID` value accepted.
    pub const MAX_USER_ID_LENGTH: usize = 128;

    pub const MAX_WIDGET_PROMPT_LENGTH: usize = 4000;
}

pub mod http {
    pub const USER_ID_HEADER: &str = "x-user-id";

    pub const USER_AGENT: &str = concat!("Promptboard/", env!("CARGO_PKG_VERSION"));
}
