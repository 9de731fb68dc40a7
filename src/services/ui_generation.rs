//! Streaming generative-UI rendering of query results.

use crate::clients::{ChatMessage, ModelError, StreamingModel, TokenStream};
use crate::constants::prompts::UI_SYSTEM_PROMPT;
use sea_orm::JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UiGenerationError {
    #[error("UI model did not start streaming within {0} seconds")]
    Timeout(u64),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Appends the serialized rows to the prompt, separated by a single space.
#[must_use]
pub fn hydrate_prompt(prompt: &str, rows: &[JsonValue]) -> String {
    let data = serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string());
    format!("{prompt} {data}")
}

pub struct UiGenerator {
    model: Arc<dyn StreamingModel>,
    start_timeout: Duration,
}

impl UiGenerator {
    #[must_use]
    pub fn new(model: Arc<dyn StreamingModel>, start_timeout: Duration) -> Self {
        Self {
            model,
            start_timeout,
        }
    }

    /// Opens the UI stream for an already hydrated prompt.
    ///
    /// Only the request that starts the stream is bounded here; gaps between
    /// fragments are policed by the consumer.
    pub async fn stream(&self, hydrated_prompt: &str) -> Result<TokenStream, UiGenerationError> {
        let messages = vec![
            ChatMessage::system(UI_SYSTEM_PROMPT),
            ChatMessage::user(hydrated_prompt),
        ];
        debug!(prompt_len = hydrated_prompt.len(), "Opening UI stream");

        tokio::time::timeout(self.start_timeout, self.model.stream(messages))
            .await
            .map_err(|_| UiGenerationError::Timeout(self.start_timeout.as_secs()))?
            .map_err(UiGenerationError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;
    use serde_json::json;
    use std::sync::Mutex;

    struct EchoModel {
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait::async_trait]
    impl StreamingModel for EchoModel {
        async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ModelError> {
            self.seen.lock().unwrap().extend(messages);
            let parts = vec![Ok("**Summary**".to_string()), Ok(" done".to_string())];
            Ok(stream::iter(parts).boxed())
        }
    }

    struct StalledModel;

    #[async_trait::async_trait]
    impl StreamingModel for StalledModel {
        async fn stream(&self, _messages: Vec<ChatMessage>) -> Result<TokenStream, ModelError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(stream::empty().boxed())
        }
    }

    #[test]
    fn test_hydrate_prompt() {
        let rows = vec![json!({"month": "2024-01", "revenue": 1200})];
        assert_eq!(
            hydrate_prompt("Show revenue", &rows),
            r#"Show revenue [{"month":"2024-01","revenue":1200}]"#
        );
        assert_eq!(hydrate_prompt("Show revenue", &[]), "Show revenue []");
    }

    #[tokio::test]
    async fn test_stream_sends_system_prompt() {
        let model = Arc::new(EchoModel {
            seen: Mutex::new(Vec::new()),
        });
        let generator = UiGenerator::new(model.clone(), Duration::from_secs(5));

        let tokens: Vec<String> = generator
            .stream("Show revenue []")
            .await
            .unwrap()
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(tokens.concat(), "**Summary** done");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].content, UI_SYSTEM_PROMPT);
        assert_eq!(seen[1].content, "Show revenue []");
    }

    #[tokio::test]
    async fn test_stream_start_times_out() {
        let generator = UiGenerator::new(Arc::new(StalledModel), Duration::from_millis(50));
        assert!(matches!(
            generator.stream("Show revenue []").await,
            Err(UiGenerationError::Timeout(_))
        ));
    }
}
