//! The widget render pipeline.
//!
//! A render loads the widget, obtains rows either from its cached query or
//! from a freshly generated one, and relays the UI model's stream back to the
//! caller while accumulating it for persistence:
//!
//! ```text
//! START -> VALIDATING -> GENERATING_SQL -> EXECUTING -> STREAMING_UI -> DONE
//!   |          |               |               |              |
//!   +----------+---------------+---------------+--------------+--> FAILED
//! ```
//!
//! A cached query skips straight to `EXECUTING`. Terminal failures on the
//! generative path soft-delete the widget; a failing cached query leaves it
//! in place.

use crate::clients::{ModelError, TokenStream};
use crate::domain::{Intent, UserId, WidgetId};
use crate::models::widget::{Widget, WidgetUpdate};
use crate::safety::{SafetyPolicies, SafetyViolation};
use crate::services::query_executor::{ExecutionError, QueryExecutor, QueryOutput};
use crate::services::sql_generation::{PriorAttempt, SqlGenerator};
use crate::services::ui_generation::{UiGenerationError, UiGenerator, hydrate_prompt};
use crate::services::widget_service::{WidgetError, WidgetService};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Widget not found")]
    WidgetNotFound(WidgetId),

    #[error(transparent)]
    InvalidPrompt(SafetyViolation),

    #[error("Exceeded max retries after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    /// The widget's cached query failed. It is not regenerated.
    #[error("Failed to fetch data for prompt: {0}")]
    Execution(ExecutionError),

    #[error("Failed to start UI generation: {0}")]
    UiModel(String),

    #[error("UI model did not start streaming within {0} seconds")]
    Timeout(u64),

    #[error("Database error: {0}")]
    Store(String),
}

impl From<WidgetError> for PipelineError {
    fn from(err: WidgetError) -> Self {
        match err {
            WidgetError::NotFound(id) => Self::WidgetNotFound(id),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<UiGenerationError> for PipelineError {
    fn from(err: UiGenerationError) -> Self {
        match err {
            UiGenerationError::Timeout(secs) => Self::Timeout(secs),
            UiGenerationError::Model(e) => Self::UiModel(e.to_string()),
        }
    }
}

/// Ends a relayed stream early. The caller sees a truncated body.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("UI stream stalled for {0} seconds")]
    Idle(u64),

    #[error(transparent)]
    Model(ModelError),
}

pub type RenderStream = BoxStream<'static, Result<String, RelayError>>;

/// Progress of the SQL generation loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Failed attempts so far.
    pub attempt: u32,
    pub last_error: Option<String>,
    pub last_candidate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStep {
    Retry(RetryState),
    Exhausted { attempts: u32, reason: String },
}

impl RetryState {
    /// Context for the next generation request, if an attempt has failed.
    #[must_use]
    pub fn prior(&self) -> Option<PriorAttempt> {
        self.last_error.as_ref().map(|error| PriorAttempt {
            candidate: self.last_candidate.clone(),
            error: error.clone(),
        })
    }

    /// Records a failed attempt. `candidate` is the SQL that failed, or
    /// `None` when the model produced nothing usable.
    #[must_use]
    pub fn record_failure(
        self,
        candidate: Option<String>,
        reason: String,
        max_retries: u32,
    ) -> RetryStep {
        let attempt = self.attempt + 1;
        if attempt >= max_retries {
            RetryStep::Exhausted {
                attempts: attempt,
                reason,
            }
        } else {
            RetryStep::Retry(Self {
                attempt,
                last_error: Some(reason),
                last_candidate: candidate,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_retries: u32,
    pub stream_idle_timeout: Duration,
}

/// Where the rows of a render came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySource {
    Cached,
    Generated,
}

impl QuerySource {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Cached => "cached",
            Self::Generated => "generated",
        }
    }
}

struct Hydrated {
    query: String,
    output: QueryOutput,
}

pub struct RenderPipeline {
    widgets: Arc<dyn WidgetService>,
    generator: Arc<SqlGenerator>,
    executor: Arc<dyn QueryExecutor>,
    ui: Arc<UiGenerator>,
    policies: Arc<SafetyPolicies>,
    settings: PipelineSettings,
}

impl RenderPipeline {
    #[must_use]
    pub fn new(
        widgets: Arc<dyn WidgetService>,
        generator: Arc<SqlGenerator>,
        executor: Arc<dyn QueryExecutor>,
        ui: Arc<UiGenerator>,
        policies: Arc<SafetyPolicies>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            widgets,
            generator,
            executor,
            ui,
            policies,
            settings,
        }
    }

    /// Runs the pipeline up to the point where the UI stream is open.
    ///
    /// `prompt` overrides the widget's stored prompt when present and
    /// non-blank.
    pub async fn render(
        &self,
        user_id: &UserId,
        widget_id: WidgetId,
        prompt: Option<&str>,
    ) -> Result<RenderStream, PipelineError> {
        let widget = self
            .widgets
            .get_widget(widget_id, user_id)
            .await?
            .ok_or(PipelineError::WidgetNotFound(widget_id))?;

        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&widget.prompt)
            .to_string();

        info!(widget_id = %widget_id, user_id = %user_id, "Rendering widget");

        let (source, hydrated) = match widget.sql_query.clone() {
            Some(query) => (QuerySource::Cached, self.run_cached(&widget, query).await?),
            None => match self.run_generative(&widget, user_id, &prompt).await {
                Ok(hydrated) => (QuerySource::Generated, hydrated),
                Err(e) => {
                    if matches!(
                        e,
                        PipelineError::InvalidPrompt(_) | PipelineError::RetriesExhausted { .. }
                    ) {
                        self.discard(widget_id, user_id).await;
                    }
                    return Err(e);
                }
            },
        };

        info!(
            widget_id = %widget_id,
            source = source.as_str(),
            row_count = hydrated.output.row_count,
            sql = %hydrated.query,
            "Widget data ready"
        );

        let hydrated_prompt = hydrate_prompt(&prompt, &hydrated.output.rows);
        let tokens = self.ui.stream(&hydrated_prompt).await.inspect_err(|e| {
            error!(widget_id = %widget_id, error = %e, "UI stream failed to start");
            metrics::counter!("pipeline_failures_total", "stage" => "ui").increment(1);
        })?;

        metrics::counter!("pipeline_renders_total", "source" => source.as_str()).increment(1);

        Ok(relay(
            tokens,
            Persist {
                widgets: self.widgets.clone(),
                widget_id,
                user_id: user_id.clone(),
            },
            self.settings.stream_idle_timeout,
        ))
    }

    async fn run_cached(&self, widget: &Widget, query: String) -> Result<Hydrated, PipelineError> {
        info!(widget_id = %widget.id, "Using cached query");
        match self.executor.execute(&query).await {
            Ok(output) => Ok(Hydrated { query, output }),
            Err(e) => {
                warn!(widget_id = %widget.id, error = %e, "Cached query failed");
                metrics::counter!("pipeline_failures_total", "stage" => "cached_query")
                    .increment(1);
                Err(PipelineError::Execution(e))
            }
        }
    }

    async fn run_generative(
        &self,
        widget: &Widget,
        user_id: &UserId,
        prompt: &str,
    ) -> Result<Hydrated, PipelineError> {
        let policy = self.policies.for_intent(Intent::Read);
        policy.validate_prompt(prompt).map_err(|violation| {
            warn!(widget_id = %widget.id, reason = %violation, "Prompt rejected");
            metrics::counter!("pipeline_failures_total", "stage" => "validation").increment(1);
            PipelineError::InvalidPrompt(violation)
        })?;

        let max_retries = self.settings.max_retries;
        let mut state = RetryState::default();

        loop {
            metrics::counter!("pipeline_sql_attempts_total").increment(1);
            let attempt = state.attempt + 1;
            info!(widget_id = %widget.id, attempt, max_retries, "Generating SQL");

            let (candidate, reason) = match self.attempt(widget.id, user_id, prompt, &state).await {
                Ok(hydrated) => return Ok(hydrated),
                Err(AttemptError::Store(e)) => return Err(e),
                Err(AttemptError::Retryable { candidate, reason }) => (candidate, reason),
            };

            warn!(widget_id = %widget.id, attempt, reason = %reason, "SQL attempt failed");
            state = match state.record_failure(candidate, reason, max_retries) {
                RetryStep::Retry(next) => next,
                RetryStep::Exhausted { attempts, reason } => {
                    error!(widget_id = %widget.id, attempts, reason = %reason, "Exceeded max retries");
                    metrics::counter!("pipeline_failures_total", "stage" => "generation")
                        .increment(1);
                    return Err(PipelineError::RetriesExhausted { attempts, reason });
                }
            };
        }
    }

    /// One generate, screen, checkpoint and execute cycle.
    async fn attempt(
        &self,
        widget_id: WidgetId,
        user_id: &UserId,
        prompt: &str,
        state: &RetryState,
    ) -> Result<Hydrated, AttemptError> {
        let prior = state.prior();
        let candidate = self
            .generator
            .generate(Intent::Read, prompt, prior.as_ref())
            .await
            .map_err(|e| AttemptError::Retryable {
                candidate: None,
                reason: e.to_string(),
            })?;

        let retry = |reason: String| AttemptError::Retryable {
            candidate: Some(candidate.clone()),
            reason,
        };

        self.policies
            .for_intent(Intent::Read)
            .validate_sql(&candidate)
            .map_err(|v| retry(v.to_string()))?;

        self.widgets
            .update_widget(widget_id, WidgetUpdate::query(candidate.clone()), user_id)
            .await
            .map_err(|e| AttemptError::Store(e.into()))?;

        let output = self
            .executor
            .execute(&candidate)
            .await
            .map_err(|e| retry(e.to_string()))?;

        Ok(Hydrated {
            query: candidate,
            output,
        })
    }

    async fn discard(&self, widget_id: WidgetId, user_id: &UserId) {
        match self.widgets.delete_widget(widget_id, user_id).await {
            Ok(()) => info!(widget_id = %widget_id, "Discarded widget after failed render"),
            Err(e) => warn!(widget_id = %widget_id, error = %e, "Failed to discard widget"),
        }
    }
}

enum AttemptError {
    Retryable {
        candidate: Option<String>,
        reason: String,
    },
    Store(PipelineError),
}

/// Target of the rendered document. The widget's `sql_query` was either
/// cached or checkpointed before the stream opened and is left untouched.
struct Persist {
    widgets: Arc<dyn WidgetService>,
    widget_id: WidgetId,
    user_id: UserId,
}

impl Persist {
    async fn save(&self, content: String) {
        match self
            .widgets
            .update_widget(self.widget_id, WidgetUpdate::content(content), &self.user_id)
            .await
        {
            Ok(_) => info!(widget_id = %self.widget_id, "Rendered content saved"),
            Err(e) => warn!(widget_id = %self.widget_id, error = %e, "Failed to save rendered content"),
        }
    }
}

struct RelayState {
    tokens: TokenStream,
    content: String,
    persist: Persist,
    idle_timeout: Duration,
    finished: bool,
}

/// Forwards fragments as they arrive and saves the full document once the
/// model finishes. A failed or stalled stream is cut short and nothing is
/// saved.
fn relay(tokens: TokenStream, persist: Persist, idle_timeout: Duration) -> RenderStream {
    let state = RelayState {
        tokens,
        content: String::new(),
        persist,
        idle_timeout,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        match tokio::time::timeout(state.idle_timeout, state.tokens.next()).await {
            Ok(Some(Ok(fragment))) => {
                state.content.push_str(&fragment);
                Some((Ok(fragment), state))
            }
            Ok(Some(Err(e))) => {
                state.finished = true;
                warn!(widget_id = %state.persist.widget_id, error = %e, "UI stream failed");
                metrics::counter!("pipeline_failures_total", "stage" => "stream").increment(1);
                Some((Err(RelayError::Model(e)), state))
            }
            Err(_) => {
                state.finished = true;
                let secs = state.idle_timeout.as_secs();
                warn!(widget_id = %state.persist.widget_id, idle_seconds = secs, "UI stream stalled");
                metrics::counter!("pipeline_failures_total", "stage" => "stream").increment(1);
                Some((Err(RelayError::Idle(secs)), state))
            }
            Ok(None) => {
                let content = std::mem::take(&mut state.content);
                state.persist.save(content).await;
                None
            }
        }
    })
    .boxed()
}
