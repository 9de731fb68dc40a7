//! Table browsing endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::validation::validate_table_name;
use super::{ApiError, ApiResponse, AppState, PageQuery};
use crate::services::{ColumnDefinition, DataModelError, TablePage, TableSummary};

impl From<DataModelError> for ApiError {
    fn from(err: DataModelError) -> Self {
        match err {
            DataModelError::Forbidden(_) => Self::forbidden(err.to_string()),
            DataModelError::NotFound(_) => Self::not_found(err.to_string()),
            DataModelError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

/// `GET /api/data-models`
pub async fn list_tables(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<TableSummary>>>, ApiError> {
    let tables = state.data_model_service().list_tables().await?;
    Ok(Json(ApiResponse::success(tables)))
}

/// `GET /api/data-models/{table}/config`
pub async fn get_table_config(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
) -> Result<Json<ApiResponse<Vec<ColumnDefinition>>>, ApiError> {
    let table = validate_table_name(&table)?;
    let columns = state.data_model_service().table_config(table).await?;
    Ok(Json(ApiResponse::success(columns)))
}

/// `GET /api/data-models/{table}/data?page=N`
///
/// Pages are 0-based.
pub async fn get_table_data(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<TablePage>>, ApiError> {
    let table = validate_table_name(&table)?;
    let page = state
        .data_model_service()
        .table_data(table, query.page)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}
