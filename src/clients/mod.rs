//! Language-model clients.
//!
//! Services depend on the [`CompletionModel`] and [`StreamingModel`] traits
//! only; [`openai::OpenAiClient`] implements both against any
//! OpenAI-compatible chat-completions endpoint.

pub mod openai;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A JSON schema the model output must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub response_format: Option<JsonSchemaFormat>,
}

impl CompletionRequest {
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            response_format: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, format: JsonSchemaFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unreadable model response: {0}")]
    Decode(String),

    #[error("Model stream interrupted: {0}")]
    Stream(String),

    #[error("Model reported an error: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Text fragments in arrival order. Concatenating every item yields the full
/// response.
pub type TokenStream = BoxStream<'static, Result<String, ModelError>>;

#[async_trait::async_trait]
pub trait CompletionModel: Send + Sync {
    /// Returns the first choice's text, or `None` when the model produced no
    /// content.
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, ModelError>;
}

#[async_trait::async_trait]
pub trait StreamingModel: Send + Sync {
    /// Starts a streamed completion. Dropping the returned stream closes the
    /// upstream connection.
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ModelError>;
}
