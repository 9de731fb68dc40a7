use super::{
    ChatMessage, CompletionModel, CompletionRequest, ModelError, StreamingModel, TokenStream,
};
use crate::config::ModelConfig;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use tracing::{debug, instrument, warn};

/// Longest upstream error body kept in a [`ModelError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiClient {
    #[must_use]
    pub fn with_shared_client(config: &ModelConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, body: &ChatCompletionRequest<'_>) -> Result<Response, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, stream = body.stream, "Sending chat completion request");

        let mut request = self.client.post(&url).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        warn!(status = status.as_u16(), "Model endpoint returned an error");
        Err(ModelError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl CompletionModel for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, ModelError> {
        let response_format = request.response_format.map(|format| {
            serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": format.name,
                    "schema": format.schema,
                    "strict": true,
                }
            })
        });

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: self.temperature,
            stream: false,
            response_format,
        };

        let response = self.post(&body).await?;
        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

#[async_trait::async_trait]
impl StreamingModel for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ModelError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &messages,
            temperature: self.temperature,
            stream: true,
            response_format: None,
        };

        let response = self.post(&body).await?;
        Ok(decode_token_stream(response.bytes_stream()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
    Error(String),
}

/// Incremental decoder for `data:` lines of a chat-completions event stream.
///
/// Bytes are buffered until a full line is available, so events and UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            events.extend(Self::parse_line(&line));
        }
        events
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        Self::parse_line(&rest).into_iter().collect()
    }

    fn parse_line(line: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let data = line.strip_prefix("data:")?.trim_start();

        if data.is_empty() {
            return None;
        }
        if data == "[DONE]" {
            return Some(SseEvent::Done);
        }

        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    return Some(SseEvent::Error(error.to_string()));
                }
                chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty())
                    .map(SseEvent::Delta)
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed stream chunk");
                None
            }
        }
    }
}

struct SseState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    done: bool,
    eof: bool,
}

/// Turns a raw byte stream of server-sent events into text fragments.
///
/// A body that ends without `data: [DONE]` was cut off upstream and ends the
/// stream with [`ModelError::Stream`].
pub fn decode_token_stream<S, B, E>(body: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
        eof: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                match event {
                    SseEvent::Delta(text) => return Some((Ok(text), state)),
                    SseEvent::Done => {
                        state.done = true;
                        state.pending.clear();
                        return None;
                    }
                    SseEvent::Error(message) => {
                        state.done = true;
                        state.pending.clear();
                        return Some((Err(ModelError::Upstream(message)), state));
                    }
                }
            }

            if state.done {
                return None;
            }

            if state.eof {
                state.done = true;
                return Some((
                    Err(ModelError::Stream("stream ended before [DONE]".to_string())),
                    state,
                ));
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(bytes.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(ModelError::Stream(e.to_string())), state));
                }
                None => {
                    state.eof = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    })
    .boxed()
}
