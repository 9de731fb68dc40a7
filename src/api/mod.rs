use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, Environment};
use crate::state::SharedState;

mod ai;
pub mod auth;
mod data_models;
mod error;
pub mod observability;
mod system;
mod types;
mod validation;
mod widgets;

pub use error::{ApiError, set_expose_internal_errors};
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn widget_service(&self) -> &Arc<dyn crate::services::WidgetService> {
        &self.shared.widget_service
    }

    #[must_use]
    pub fn data_model_service(&self) -> &Arc<dyn crate::services::DataModelService> {
        &self.shared.data_model_service
    }

    #[must_use]
    pub fn record_service(&self) -> &Arc<crate::services::RecordService> {
        &self.shared.record_service
    }

    #[must_use]
    pub fn pipeline(&self) -> &Arc<crate::services::RenderPipeline> {
        &self.shared.pipeline
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    set_expose_internal_errors(shared.config.general.environment == Environment::Development);

    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.config().server;

    let cors_layer = if server.cors_allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .cors_allowed_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let api_router = Router::new()
        .merge(create_user_router(state.clone()))
        .route("/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(middleware::from_fn(observability::logging_middleware))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}

/// Routes that act on behalf of a user and therefore need `X-User-ID`.
fn create_user_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Bounds the work done before a response starts. Streamed bodies are not
    // affected once headers are sent.
    let request_timeout = Duration::from_secs(state.config().server.request_timeout_seconds);

    Router::new()
        .route(
            "/widgets",
            get(widgets::list_widgets).post(widgets::create_widget),
        )
        .route(
            "/widgets/{id}",
            get(widgets::get_widget).delete(widgets::delete_widget),
        )
        .route("/ai/generate-ui", post(ai::generate_ui))
        .route("/ai/generate", post(ai::generate_ui))
        .route("/ai/save-record", post(ai::save_record))
        .route(
            "/ai/save-record/conversation",
            post(ai::record_conversation),
        )
        .route("/data-models", get(data_models::list_tables))
        .route(
            "/data-models/{table}/config",
            get(data_models::get_table_config),
        )
        .route(
            "/data-models/{table}/data",
            get(data_models::get_table_data),
        )
        .route_layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::GATEWAY_TIMEOUT,
            request_timeout,
        ))
        .route_layer(middleware::from_fn(auth::user_id_middleware))
}
