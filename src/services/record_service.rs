//! Inserting and updating records from natural-language requests.
//!
//! Unlike widget rendering there is no retry loop: one candidate is generated,
//! screened with the update policy and executed.

use crate::clients::{ChatMessage, Role};
use crate::domain::{Intent, UserId};
use crate::safety::{SafetyPolicies, SafetyViolation};
use crate::services::data_model_service::DataModelService;
use crate::services::query_executor::{ExecutionError, QueryExecutor};
use crate::services::sql_generation::{GenerationError, RecordDraft, SqlGenerator};
use crate::services::upload::UploadError;
use sea_orm::JsonValue;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Access to this table is forbidden")]
    Forbidden(String),

    #[error(transparent)]
    InvalidPrompt(SafetyViolation),

    #[error(transparent)]
    UnsafeSql(SafetyViolation),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversationOutcome {
    #[serde(rename_all = "camelCase")]
    Executed { query: String, affected_rows: u64 },
    NeedsInformation { question: String },
}

/// Combines the request with its target table and uploaded data.
#[must_use]
pub fn compose_record_prompt(prompt: &str, table: Option<&str>, data: Option<&JsonValue>) -> String {
    let mut composed = prompt.trim().to_string();
    if let Some(table) = table {
        composed.push_str("\n\nTarget table: ");
        composed.push_str(table);
    }
    if let Some(data) = data {
        composed.push_str("\n\nData to insert: ");
        composed.push_str(&data.to_string());
    }
    composed
}

pub struct RecordService {
    generator: Arc<SqlGenerator>,
    executor: Arc<dyn QueryExecutor>,
    data_models: Arc<dyn DataModelService>,
    policies: Arc<SafetyPolicies>,
}

impl RecordService {
    #[must_use]
    pub fn new(
        generator: Arc<SqlGenerator>,
        executor: Arc<dyn QueryExecutor>,
        data_models: Arc<dyn DataModelService>,
        policies: Arc<SafetyPolicies>,
    ) -> Self {
        Self {
            generator,
            executor,
            data_models,
            policies,
        }
    }

    fn check_table(&self, table: Option<&str>) -> Result<(), RecordError> {
        match table {
            Some(table) if self.data_models.is_protected(table) => {
                Err(RecordError::Forbidden(table.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn execute_screened(&self, user_id: &UserId, sql: &str) -> Result<u64, RecordError> {
        self.policies
            .for_intent(Intent::Update)
            .validate_sql(sql)
            .map_err(|violation| {
                warn!(user_id = %user_id, sql = %sql, reason = %violation, "Rejected record SQL");
                RecordError::UnsafeSql(violation)
            })?;

        let output = self.executor.execute(sql).await?;
        info!(user_id = %user_id, affected_rows = output.row_count, "Record query executed");
        Ok(output.row_count)
    }

    /// Returns the number of affected rows.
    pub async fn save_record(
        &self,
        user_id: &UserId,
        prompt: &str,
        table: Option<&str>,
        upload: Option<&JsonValue>,
    ) -> Result<u64, RecordError> {
        self.check_table(table)?;
        self.policies
            .for_intent(Intent::Update)
            .validate_prompt(prompt)
            .map_err(RecordError::InvalidPrompt)?;

        let composed = compose_record_prompt(prompt, table, upload);
        let sql = self
            .generator
            .generate(Intent::Update, &composed, None)
            .await?;

        self.execute_screened(user_id, &sql).await
    }

    /// Continues a record conversation. The model either asks for missing
    /// values, leaving the database untouched, or answers with a statement
    /// that is screened and executed.
    pub async fn converse(
        &self,
        user_id: &UserId,
        mut turns: Vec<ChatMessage>,
        table: Option<&str>,
    ) -> Result<ConversationOutcome, RecordError> {
        self.check_table(table)?;

        let latest = turns
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        self.policies
            .for_intent(Intent::Update)
            .validate_prompt(latest)
            .map_err(RecordError::InvalidPrompt)?;

        turns.retain(|m| m.role != Role::System);
        if let Some(table) = table {
            turns.insert(0, ChatMessage::system(format!("Target table: {table}")));
        }

        match self.generator.draft_record(turns).await? {
            RecordDraft::NeedsInformation(question) => {
                info!(user_id = %user_id, "Record draft needs more information");
                Ok(ConversationOutcome::NeedsInformation { question })
            }
            RecordDraft::Query(query) => {
                let affected_rows = self.execute_screened(user_id, &query).await?;
                Ok(ConversationOutcome::Executed {
                    query,
                    affected_rows,
                })
            }
        }
    }
}
