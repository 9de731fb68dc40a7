pub mod data_model_service;
pub use data_model_service::{
    ColumnDefinition, DataModelError, DataModelService, SeaOrmDataModelService, TablePage,
    TableSummary,
};

pub mod pipeline;
pub use pipeline::{PipelineError, PipelineSettings, RelayError, RenderPipeline, RenderStream};

pub mod query_executor;
pub use query_executor::{ExecutionError, QueryExecutor, QueryOutput, SeaOrmQueryExecutor};

pub mod record_service;
pub use record_service::{ConversationOutcome, RecordError, RecordService};

pub mod sql_generation;
pub use sql_generation::{GenerationError, SqlGenerator};

pub mod ui_generation;
pub use ui_generation::{UiGenerationError, UiGenerator};

pub mod upload;
pub use upload::{UploadError, parse_upload};

pub mod widget_service;
pub use widget_service::{WidgetError, WidgetService};

pub mod widget_service_impl;
pub use widget_service_impl::SeaOrmWidgetService;
