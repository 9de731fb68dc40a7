#![allow(dead_code)]

use futures::stream::{self, StreamExt};
use promptboard::clients::openai::decode_token_stream;
use promptboard::clients::{
    ChatMessage, CompletionModel, CompletionRequest, ModelError, StreamingModel, TokenStream,
};
use promptboard::config::Config;
use promptboard::domain::UserId;
use promptboard::state::SharedState;
use sea_orm::ConnectionTrait;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

/// Answers SQL requests from a script. Once the script runs out the last
/// reply is repeated.
pub struct ScriptedSql {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    pub seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedSql {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
            last: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> CompletionRequest {
        self.seen.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl CompletionModel for ScriptedSql {
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, ModelError> {
        self.seen.lock().unwrap().push(request);

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.replies.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        Ok(last.clone())
    }
}

/// Streams a fixed HTML document in three fragments and records the
/// hydrated prompt it was given.
pub struct HtmlUi {
    pub prompts: Mutex<Vec<String>>,
}

impl HtmlUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

pub const HTML_FRAGMENTS: [&str; 3] = ["<div class=\"chart\">", "<canvas></canvas>", "</div>"];

#[async_trait::async_trait]
impl StreamingModel for HtmlUi {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ModelError> {
        if let Some(user) = messages.last() {
            self.prompts.lock().unwrap().push(user.content.clone());
        }
        Ok(stream::iter(HTML_FRAGMENTS.map(|f| Ok(f.to_string()))).boxed())
    }
}

/// How one UI stream behaves.
#[derive(Debug, Clone)]
pub enum UiScript {
    /// Emits the fragments, then ends normally.
    Document(Vec<&'static str>),
    /// Emits one fragment, then fails.
    FailAfter(&'static str),
    /// Emits one fragment, then never produces anything again.
    StallAfter(&'static str),
    /// One server-sent event frame, then the connection closes without
    /// `data: [DONE]`.
    CutOff(&'static str),
}

impl UiScript {
    fn into_tokens(self) -> TokenStream {
        match self {
            Self::Document(fragments) => {
                stream::iter(fragments.into_iter().map(|f| Ok(f.to_string()))).boxed()
            }
            Self::FailAfter(fragment) => stream::iter([
                Ok(fragment.to_string()),
                Err(ModelError::Stream("connection reset".to_string())),
            ])
            .boxed(),
            Self::StallAfter(fragment) => stream::iter([Ok(fragment.to_string())])
                .chain(stream::pending())
                .boxed(),
            Self::CutOff(fragment) => {
                let frame = format!(
                    "data: {}\n\n",
                    serde_json::json!({"choices": [{"delta": {"content": fragment}}]})
                );
                let body: Vec<Result<Vec<u8>, Infallible>> = vec![Ok(frame.into_bytes())];
                decode_token_stream(stream::iter(body))
            }
        }
    }
}

/// Plays one [`UiScript`] per stream request, in order. The last script is
/// repeated once the queue is empty.
pub struct ScriptedUi {
    scripts: Mutex<VecDeque<UiScript>>,
    last: Mutex<Option<UiScript>>,
}

impl ScriptedUi {
    pub fn new(scripts: Vec<UiScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            last: Mutex::new(None),
        })
    }
}

#[async_trait::async_trait]
impl StreamingModel for ScriptedUi {
    async fn stream(&self, _messages: Vec<ChatMessage>) -> Result<TokenStream, ModelError> {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.scripts.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        let script = last
            .clone()
            .unwrap_or_else(|| UiScript::Document(Vec::new()));
        Ok(script.into_tokens())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.observability.metrics_enabled = false;
    config
}

pub async fn shared_state(sql: Arc<ScriptedSql>, ui: Arc<HtmlUi>) -> Arc<SharedState> {
    shared_state_with(test_config(), sql, ui).await
}

pub async fn shared_state_with(
    config: Config,
    sql: Arc<ScriptedSql>,
    ui: Arc<dyn StreamingModel>,
) -> Arc<SharedState> {
    Arc::new(
        SharedState::with_models(config, sql, ui)
            .await
            .expect("failed to build shared state"),
    )
}

pub fn user(id: &str) -> UserId {
    UserId::parse(id).expect("valid user id")
}

/// Creates `orders` with one order per month of 2024.
pub async fn seed_orders(state: &SharedState) {
    let conn = &state.store.conn;
    conn.execute_unprepared(
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer TEXT NOT NULL,
            amount REAL NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .await
    .expect("create orders");

    for month in 1..=12 {
        conn.execute_unprepared(&format!(
            "INSERT INTO orders (customer, amount, created_at) \
             VALUES ('customer-{month}', {}, '2024-{month:02}-15')",
            month * 100
        ))
        .await
        .expect("insert order");
    }
}

pub const MONTHLY_REVENUE_SQL: &str = "SELECT strftime('%Y-%m', created_at) AS month, SUM(amount) AS revenue \
     FROM orders GROUP BY month ORDER BY month";
