use std::sync::Arc;
use std::time::Duration;

use crate::clients::openai::OpenAiClient;
use crate::clients::{CompletionModel, StreamingModel};
use crate::config::Config;
use crate::constants::http::USER_AGENT;
use crate::db::Store;
use crate::safety::{SafetyPolicies, SafetySettings};
use crate::services::{
    DataModelService, PipelineSettings, QueryExecutor, RecordService, RenderPipeline,
    SeaOrmDataModelService, SeaOrmQueryExecutor, SeaOrmWidgetService, SqlGenerator, UiGenerator,
    WidgetService,
};

/// Build a shared HTTP client for the model endpoints.
///
/// Only connecting is bounded: UI responses stream for as long as the model
/// keeps producing, and the pipeline applies its own per-call timeouts.
fn build_shared_http_client(connect_timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_seconds))
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub policies: Arc<SafetyPolicies>,

    pub widget_service: Arc<dyn WidgetService>,

    pub data_model_service: Arc<dyn DataModelService>,

    pub record_service: Arc<RecordService>,

    pub pipeline: Arc<RenderPipeline>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = build_shared_http_client(config.pipeline.model_timeout_seconds)?;

        let sql_client = OpenAiClient::with_shared_client(&config.sql_model, http_client.clone());
        let ui_client = OpenAiClient::with_shared_client(&config.ui_model, http_client);
        tracing::info!(
            sql_model = sql_client.model(),
            ui_model = ui_client.model(),
            "Model clients configured"
        );

        Self::with_models(config, Arc::new(sql_client), Arc::new(ui_client)).await
    }

    /// Wires every service around the given model backends.
    pub async fn with_models(
        config: Config,
        sql_model: Arc<dyn CompletionModel>,
        ui_model: Arc<dyn StreamingModel>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let policies = Arc::new(
            SafetyPolicies::new(&SafetySettings::from_config(&config))
                .map_err(|e| anyhow::anyhow!("Failed to compile safety dictionaries: {e}"))?,
        );

        let model_timeout = Duration::from_secs(config.pipeline.model_timeout_seconds);

        let widget_service =
            Arc::new(SeaOrmWidgetService::new(store.clone())) as Arc<dyn WidgetService>;

        let data_model_service = Arc::new(SeaOrmDataModelService::new(
            store.clone(),
            config.data_models.protected_tables.clone(),
            config.data_models.page_size,
        )) as Arc<dyn DataModelService>;

        let executor = Arc::new(SeaOrmQueryExecutor::new(&store)) as Arc<dyn QueryExecutor>;

        let generator = Arc::new(SqlGenerator::new(
            sql_model,
            data_model_service.clone(),
            config.sql_model.schema_description.clone(),
            model_timeout,
        ));

        let ui_generator = Arc::new(UiGenerator::new(ui_model, model_timeout));

        let record_service = Arc::new(RecordService::new(
            generator.clone(),
            executor.clone(),
            data_model_service.clone(),
            policies.clone(),
        ));

        let pipeline = Arc::new(RenderPipeline::new(
            widget_service.clone(),
            generator,
            executor,
            ui_generator,
            policies.clone(),
            PipelineSettings {
                max_retries: config.pipeline.max_retries,
                stream_idle_timeout: Duration::from_secs(
                    config.pipeline.stream_idle_timeout_seconds,
                ),
            },
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            policies,
            widget_service,
            data_model_service,
            record_service,
            pipeline,
        })
    }
}
