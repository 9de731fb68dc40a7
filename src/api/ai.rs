//! Model-backed endpoints: widget rendering and record entry.

use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::validation::{ValidJson, validate_table_name};
use super::{
    ApiError, ApiResponse, AppState, ConversationRequest, GenerateUiRequest, SaveRecordResponse,
};
use crate::domain::UserId;
use crate::services::sql_generation::GenerationError;
use crate::services::{
    ConversationOutcome, ExecutionError, PipelineError, RecordError, parse_upload,
};

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::WidgetNotFound(_) => Self::widget_not_found(),
            PipelineError::InvalidPrompt(_)
            | PipelineError::RetriesExhausted { .. }
            | PipelineError::Execution(_) => Self::validation(err.to_string()),
            PipelineError::Timeout(_) => Self::Timeout(err.to_string()),
            PipelineError::UiModel(msg) => Self::internal(msg),
            PipelineError::Store(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Forbidden(_) => Self::forbidden(err.to_string()),
            RecordError::Generation(GenerationError::Timeout(_)) => Self::Timeout(err.to_string()),
            RecordError::Generation(GenerationError::Model(e)) => {
                Self::model_error("SQL model", e.to_string())
            }
            RecordError::Generation(GenerationError::Schema(e)) => Self::internal(e.to_string()),
            RecordError::Execution(ExecutionError::Internal(msg)) => Self::internal(msg),
            RecordError::InvalidPrompt(_)
            | RecordError::UnsafeSql(_)
            | RecordError::Upload(_)
            | RecordError::Generation(_)
            | RecordError::Execution(_) => Self::validation(err.to_string()),
        }
    }
}

/// `POST /api/ai/generate-ui` (also served at `/api/ai/generate`)
///
/// Everything up to the first UI fragment is reported as a JSON error. Once
/// streaming starts the response is `text/event-stream` carrying raw
/// fragments; a failure after that point ends the body early.
pub async fn generate_ui(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    ValidJson(payload): ValidJson<GenerateUiRequest>,
) -> Result<Response, ApiError> {
    let stream = state
        .pipeline()
        .render(&user_id, payload.widget_id, payload.prompt.as_deref())
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `POST /api/ai/save-record`
///
/// Multipart form with a `prompt`, an optional `tableName` and an optional
/// `file` (JSON, CSV or XLSX) whose rows are handed to the model.
pub async fn save_record(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<SaveRecordResponse>>, ApiError> {
    let mut prompt = None;
    let mut table_name = None;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(e.body_text()))?
    {
        match field.name() {
            Some("prompt") => {
                prompt = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation(e.body_text()))?,
                );
            }
            Some("tableName") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(e.body_text()))?;
                if !value.trim().is_empty() {
                    table_name = Some(validate_table_name(&value)?.to_string());
                }
            }
            Some("file") => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(e.body_text()))?;
                let data = parse_upload(&bytes, content_type.as_deref())
                    .map_err(RecordError::from)?;
                upload = Some(data);
            }
            _ => {}
        }
    }

    let prompt = prompt.unwrap_or_default();
    let affected_rows = state
        .record_service()
        .save_record(&user_id, &prompt, table_name.as_deref(), upload.as_ref())
        .await?;

    Ok(Json(ApiResponse::success(SaveRecordResponse {
        affected_rows,
    })))
}

/// `POST /api/ai/save-record/conversation`
pub async fn record_conversation(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    ValidJson(payload): ValidJson<ConversationRequest>,
) -> Result<Json<ApiResponse<ConversationOutcome>>, ApiError> {
    let table_name = match payload.table_name.as_deref() {
        Some(name) if !name.trim().is_empty() => Some(validate_table_name(name)?),
        _ => None,
    };

    let outcome = state
        .record_service()
        .converse(&user_id, payload.messages, table_name)
        .await?;

    Ok(Json(ApiResponse::success(outcome)))
}
