//! Prompt and generated-SQL screening.
//!
//! A [`SafetyPolicy`] bundles the weighted prompt dictionary and the SQL
//! keyword list for one [`Intent`]. Both lists are compiled into whole-word
//! regular expressions once, when the policy is built.

pub mod dictionary;

use crate::config::Config;
use crate::domain::Intent;
use dictionary::WeightedTerm;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("Prompt cannot be empty.")]
    EmptyPrompt,

    #[error("Prompt is too short.")]
    PromptTooShort,

    #[error(
        "Your prompt seems to contain potentially harmful content. Please rephrase it. Malicious score: {score}/{max_score}"
    )]
    HarmfulPrompt {
        score: u32,
        max_score: u32,
        matched: Vec<String>,
    },

    #[error("SQL query cannot be empty.")]
    EmptySql,

    #[error("The SQL query contains forbidden keywords or operations: {}", .keywords.join(", "))]
    ForbiddenSql { keywords: Vec<String> },

    #[error("The SQL query references a protected table: {table}")]
    ProtectedTable { table: String },
}

#[derive(Debug, Clone)]
pub struct SafetySettings {
    pub case_sensitive: bool,
    pub min_prompt_length: usize,
    pub protected_tables: Vec<String>,
}

impl SafetySettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            case_sensitive: config.safety.case_sensitive,
            min_prompt_length: config.safety.min_prompt_length,
            protected_tables: config.data_models.protected_tables.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct TermMatcher {
    term: String,
    weight: u32,
    pattern: Regex,
}

impl TermMatcher {
    fn new(term: &str, weight: u32, case_sensitive: bool) -> Result<Self, regex::Error> {
        Ok(Self {
            term: term.to_string(),
            weight,
            pattern: whole_word_pattern(term, case_sensitive)?,
        })
    }

    fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Word boundaries are only asserted on ends of the term that are word
/// characters, so punctuation terms such as `;` or `--` match anywhere
/// while `OR` does not match inside `organism`.
fn whole_word_pattern(term: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
    let mut pattern = String::new();
    if !case_sensitive {
        pattern.push_str("(?i)");
    }
    if term.chars().next().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }

    let body = term
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    pattern.push_str(&body);

    if term.chars().last().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern)
}

/// Screening rules for one intent.
#[derive(Debug, Clone)]
pub struct SafetyPolicy {
    intent: Intent,
    prompt_terms: Vec<TermMatcher>,
    sql_keywords: Vec<TermMatcher>,
    protected_tables: Vec<TermMatcher>,
    min_prompt_length: usize,
    max_score: u32,
}

impl SafetyPolicy {
    pub fn new(
        intent: Intent,
        prompt_terms: &[WeightedTerm],
        sql_keywords: &[&str],
        settings: &SafetySettings,
    ) -> Result<Self, regex::Error> {
        let prompt_terms = prompt_terms
            .iter()
            .map(|t| TermMatcher::new(t.term, t.weight, settings.case_sensitive))
            .collect::<Result<Vec<_>, _>>()?;

        // SQL keyword screening ignores case: models freely mix `drop` and `DROP`.
        let sql_keywords = sql_keywords
            .iter()
            .map(|k| TermMatcher::new(k, 0, false))
            .collect::<Result<Vec<_>, _>>()?;

        let protected_tables = settings
            .protected_tables
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| TermMatcher::new(t, 0, false))
            .collect::<Result<Vec<_>, _>>()?;

        let max_score = prompt_terms.iter().map(|t| t.weight).sum();

        Ok(Self {
            intent,
            prompt_terms,
            sql_keywords,
            protected_tables,
            min_prompt_length: settings.min_prompt_length,
            max_score,
        })
    }

    pub fn read(settings: &SafetySettings) -> Result<Self, regex::Error> {
        Self::new(
            Intent::Read,
            dictionary::READ_PROMPT_TERMS,
            dictionary::READ_SQL_KEYWORDS,
            settings,
        )
    }

    pub fn update(settings: &SafetySettings) -> Result<Self, regex::Error> {
        Self::new(
            Intent::Update,
            dictionary::UPDATE_PROMPT_TERMS,
            dictionary::UPDATE_SQL_KEYWORDS,
            settings,
        )
    }

    #[must_use]
    pub const fn intent(&self) -> Intent {
        self.intent
    }

    #[must_use]
    pub const fn max_score(&self) -> u32 {
        self.max_score
    }

    /// Scores a natural-language prompt against the weighted dictionary.
    pub fn validate_prompt(&self, text: &str) -> Result<(), SafetyViolation> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SafetyViolation::EmptyPrompt);
        }
        if trimmed.chars().count() < self.min_prompt_length {
            return Err(SafetyViolation::PromptTooShort);
        }

        let matched: Vec<&TermMatcher> = self
            .prompt_terms
            .iter()
            .filter(|t| t.is_match(text))
            .collect();

        if matched.is_empty() {
            return Ok(());
        }

        let score = matched.iter().map(|t| t.weight).sum();
        Err(SafetyViolation::HarmfulPrompt {
            score,
            max_score: self.max_score,
            matched: matched.iter().map(|t| t.term.clone()).collect(),
        })
    }

    /// Screens model-generated SQL before it is cached or executed.
    pub fn validate_sql(&self, sql: &str) -> Result<(), SafetyViolation> {
        if sql.trim().is_empty() {
            return Err(SafetyViolation::EmptySql);
        }

        let keywords: Vec<String> = self
            .sql_keywords
            .iter()
            .filter(|k| k.is_match(sql))
            .map(|k| k.term.clone())
            .collect();
        if !keywords.is_empty() {
            return Err(SafetyViolation::ForbiddenSql { keywords });
        }

        if let Some(table) = self.protected_tables.iter().find(|t| t.is_match(sql)) {
            return Err(SafetyViolation::ProtectedTable {
                table: table.term.clone(),
            });
        }

        Ok(())
    }
}

/// The read and update policies, built once at startup.
#[derive(Debug, Clone)]
pub struct SafetyPolicies {
    read: SafetyPolicy,
    update: SafetyPolicy,
}

impl SafetyPolicies {
    pub fn new(settings: &SafetySettings) -> Result<Self, regex::Error> {
        Ok(Self {
            read: SafetyPolicy::read(settings)?,
            update: SafetyPolicy::update(settings)?,
        })
    }

    #[must_use]
    pub const fn for_intent(&self, intent: Intent) -> &SafetyPolicy {
        match intent {
            Intent::Read => &self.read,
            Intent::Update => &self.update,
        }
    }
}
