//! Widget endpoints.
//!
//! Every handler is scoped to the caller from [`user_id_middleware`]; a
//! widget belonging to another user answers 404 like a missing one.
//!
//! [`user_id_middleware`]: super::auth::user_id_middleware

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::{ValidJson, validate_widget_id};
use super::{ApiError, ApiResponse, AppState, CreateWidgetRequest};
use crate::domain::UserId;
use crate::models::widget::Widget;
use crate::services::WidgetError;

impl From<WidgetError> for ApiError {
    fn from(err: WidgetError) -> Self {
        match err {
            WidgetError::NotFound(_) => Self::widget_not_found(),
            WidgetError::Validation(msg) => Self::validation(msg),
            WidgetError::Database(msg) => Self::DatabaseError(msg),
            WidgetError::Internal(msg) => Self::internal(msg),
        }
    }
}

/// `POST /api/widgets`
pub async fn create_widget(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    ValidJson(payload): ValidJson<CreateWidgetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Widget>>), ApiError> {
    let widget = state
        .widget_service()
        .create_widget(&user_id, &payload.prompt)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(widget))))
}

/// `GET /api/widgets`
pub async fn list_widgets(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<ApiResponse<Vec<Widget>>>, ApiError> {
    let widgets = state.widget_service().list_widgets(&user_id).await?;
    Ok(Json(ApiResponse::success(widgets)))
}

/// `GET /api/widgets/{id}`
pub async fn get_widget(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Widget>>, ApiError> {
    let id = validate_widget_id(id)?;

    let widget = state
        .widget_service()
        .get_widget(id, &user_id)
        .await?
        .ok_or_else(ApiError::widget_not_found)?;

    Ok(Json(ApiResponse::success(widget)))
}

/// `DELETE /api/widgets/{id}`
pub async fn delete_widget(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = validate_widget_id(id)?;
    state.widget_service().delete_widget(id, &user_id).await?;
    Ok(Json(ApiResponse::success(())))
}
