//! Turns natural-language prompts into SQL candidates.

use crate::clients::{ChatMessage, CompletionModel, CompletionRequest, JsonSchemaFormat, ModelError};
use crate::constants::prompts;
use crate::domain::Intent;
use crate::services::data_model_service::{DataModelError, DataModelService};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to generate query from prompt")]
    Empty,

    #[error("SQL model did not answer within {0} seconds")]
    Timeout(u64),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to read database schema: {0}")]
    Schema(#[from] DataModelError),

    #[error("Unreadable record draft: {0}")]
    Draft(String),
}

/// The candidate and failure reason of the previous attempt, fed back to the
/// model so it can correct itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorAttempt {
    pub candidate: Option<String>,
    pub error: String,
}

/// Outcome of a conversational record request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDraft {
    Query(String),
    NeedsInformation(String),
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    query: Option<String>,
    missing_information: Option<String>,
}

/// Builds the message sequence for one generation attempt.
#[must_use]
pub fn build_messages(system: String, prompt: &str, prior: Option<&PriorAttempt>) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];

    if let Some(prior) = prior {
        if let Some(candidate) = &prior.candidate {
            messages.push(ChatMessage::assistant(format!(
                "{}{candidate}",
                prompts::PREVIOUS_RESPONSE_PREFIX
            )));
        }
        messages.push(ChatMessage::user(prompts::correction_request(&prior.error)));
    }

    messages
}

/// Strips a surrounding markdown code fence such as ` ```sql ... ``` `.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn draft_schema() -> JsonSchemaFormat {
    JsonSchemaFormat {
        name: "record_draft".to_string(),
        schema: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": ["string", "null"] },
                "missing_information": { "type": ["string", "null"] }
            },
            "required": ["query", "missing_information"],
            "additionalProperties": false
        }),
    }
}

pub struct SqlGenerator {
    model: Arc<dyn CompletionModel>,
    data_models: Arc<dyn DataModelService>,
    schema_override: Option<String>,
    timeout: Duration,
}

impl SqlGenerator {
    #[must_use]
    pub fn new(
        model: Arc<dyn CompletionModel>,
        data_models: Arc<dyn DataModelService>,
        schema_override: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            data_models,
            schema_override,
            timeout,
        }
    }

    async fn schema(&self) -> Result<String, GenerationError> {
        match &self.schema_override {
            Some(schema) => Ok(schema.clone()),
            None => Ok(self.data_models.schema_description().await?),
        }
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, GenerationError> {
        let content = tokio::time::timeout(self.timeout, self.model.complete(request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout.as_secs()))??;

        content
            .as_deref()
            .map(strip_code_fence)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .ok_or(GenerationError::Empty)
    }

    /// Asks the model for one SQL candidate.
    pub async fn generate(
        &self,
        intent: Intent,
        prompt: &str,
        prior: Option<&PriorAttempt>,
    ) -> Result<String, GenerationError> {
        let schema = self.schema().await?;
        let system = match intent {
            Intent::Read => prompts::read_system_prompt(&schema),
            Intent::Update => prompts::update_system_prompt(&schema),
        };
        let messages = build_messages(system, prompt, prior);
        debug!(intent = %intent, messages = messages.len(), "Requesting SQL candidate");

        let sql = self.complete(CompletionRequest::new(messages)).await?;
        info!(intent = %intent, sql = %sql, "Generated SQL candidate");
        Ok(sql)
    }

    /// Structured variant used by the conversational record flow.
    pub async fn draft_record(
        &self,
        conversation: Vec<ChatMessage>,
    ) -> Result<RecordDraft, GenerationError> {
        let schema = self.schema().await?;
        let mut messages = vec![ChatMessage::system(prompts::record_draft_system_prompt(
            &schema,
        ))];
        messages.extend(conversation);

        let raw = self
            .complete(CompletionRequest::new(messages).with_schema(draft_schema()))
            .await?;
        let draft: DraftResponse =
            serde_json::from_str(&raw).map_err(|e| GenerationError::Draft(e.to_string()))?;

        let query = draft.query.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
        let missing = draft
            .missing_information
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        match (query, missing) {
            (_, Some(question)) => Ok(RecordDraft::NeedsInformation(question)),
            (Some(query), None) => Ok(RecordDraft::Query(strip_code_fence(&query).to_string())),
            (None, None) => Err(GenerationError::Empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::Role;
    use crate::services::data_model_service::{ColumnDefinition, TablePage, TableSummary};
    use std::sync::Mutex;

    struct ScriptedModel {
        replies: Mutex<Vec<Option<String>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: &[Option<&str>]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.map(String::from)).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CompletionModel for ScriptedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, ModelError> {
            self.seen.lock().unwrap().push(request);
            Ok(self.replies.lock().unwrap().pop().flatten())
        }
    }

    struct NoTables;

    #[async_trait::async_trait]
    impl DataModelService for NoTables {
        async fn list_tables(&self) -> Result<Vec<TableSummary>, DataModelError> {
            Ok(Vec::new())
        }
        async fn table_config(&self, table: &str) -> Result<Vec<ColumnDefinition>, DataModelError> {
            Err(DataModelError::NotFound(table.to_string()))
        }
        async fn table_data(&self, table: &str, _page: u64) -> Result<TablePage, DataModelError> {
            Err(DataModelError::NotFound(table.to_string()))
        }
        async fn schema_description(&self) -> Result<String, DataModelError> {
            Ok("- orders(id INTEGER, amount REAL)\n".to_string())
        }
        fn is_protected(&self, _table: &str) -> bool {
            false
        }
    }

    fn generator(model: Arc<ScriptedModel>) -> SqlGenerator {
        SqlGenerator::new(model, Arc::new(NoTables), None, Duration::from_secs(5))
    }

    #[test]
    fn test_build_messages_with_prior_attempt() {
        let prior = PriorAttempt {
            candidate: Some("SELECT * FROM ordrs".to_string()),
            error: "no such table: ordrs".to_string(),
        };
        let messages = build_messages("sys".to_string(), "monthly revenue", Some(&prior));

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "monthly revenue");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "Previous response: SELECT * FROM ordrs");
        assert_eq!(
            messages[3].content,
            "The previous response was incorrect. Here is the reason: no such table: ordrs. Please try again with the same prompt."
        );
    }

    #[test]
    fn test_build_messages_without_candidate() {
        let prior = PriorAttempt {
            candidate: None,
            error: "Failed to generate query from prompt".to_string(),
        };
        let messages = build_messages("sys".to_string(), "p", Some(&prior));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role, Role::User);

        assert_eq!(build_messages("sys".to_string(), "p", None).len(), 2);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_code_fence("```\nSELECT 1\n```\n"), "SELECT 1");
        assert_eq!(strip_code_fence("  SELECT 1  "), "SELECT 1");
    }

    #[tokio::test]
    async fn test_generate_uses_schema_and_rejects_empty() {
        let model = Arc::new(ScriptedModel::new(&[Some("```sql\nSELECT 1\n```"), None]));
        let generator = generator(model.clone());

        let sql = generator.generate(Intent::Read, "revenue by month", None).await.unwrap();
        assert_eq!(sql, "SELECT 1");

        let err = generator.generate(Intent::Update, "add an order of 5", None).await.unwrap_err();
        assert!(matches!(err, GenerationError::Empty));
        assert_eq!(err.to_string(), "Failed to generate query from prompt");

        let seen = model.seen.lock().unwrap();
        assert!(seen[0].messages[0].content.contains("- orders(id INTEGER, amount REAL)"));
        assert!(seen[1].messages[0].content.contains("add and modify records"));
        assert!(seen[0].response_format.is_none());
    }

    #[tokio::test]
    async fn test_draft_record() {
        let model = Arc::new(ScriptedModel::new(&[
            Some(r#"{"query": null, "missing_information": "Which room number?"}"#),
            Some(r#"{"query": "INSERT INTO rooms (room_number) VALUES ('12')", "missing_information": null}"#),
            Some("not json"),
        ]));
        let generator = generator(model.clone());
        let conversation = vec![ChatMessage::user("Add a new room on floor 3")];

        assert_eq!(
            generator.draft_record(conversation.clone()).await.unwrap(),
            RecordDraft::NeedsInformation("Which room number?".to_string())
        );
        assert_eq!(
            generator.draft_record(conversation.clone()).await.unwrap(),
            RecordDraft::Query("INSERT INTO rooms (room_number) VALUES ('12')".to_string())
        );
        assert!(matches!(
            generator.draft_record(conversation).await,
            Err(GenerationError::Draft(_))
        ));

        let seen = model.seen.lock().unwrap();
        assert_eq!(
            seen[0].response_format.as_ref().map(|f| f.name.as_str()),
            Some("record_draft")
        );
        assert_eq!(seen[0].messages.len(), 2);
    }
}
