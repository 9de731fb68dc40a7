//! Domain service for user-owned widgets.
//!
//! Every operation takes the caller's [`UserId`] explicitly; a widget owned
//! by someone else is indistinguishable from one that does not exist.

use crate::domain::{UserId, WidgetId};
use crate::models::widget::{Widget, WidgetUpdate};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("Widget not found")]
    NotFound(WidgetId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for WidgetError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for WidgetError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait WidgetService: Send + Sync {
    /// Creates an empty widget holding only the prompt.
    async fn create_widget(&self, user_id: &UserId, prompt: &str) -> Result<Widget, WidgetError>;

    /// Lists the caller's live widgets, oldest first.
    async fn list_widgets(&self, user_id: &UserId) -> Result<Vec<Widget>, WidgetError>;

    /// Returns `None` for missing, deleted or foreign widgets.
    async fn get_widget(
        &self,
        id: WidgetId,
        user_id: &UserId,
    ) -> Result<Option<Widget>, WidgetError>;

    /// Overwrites only the fields set in `update`.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::NotFound`] when no live widget with this id
    /// belongs to the caller.
    async fn update_widget(
        &self,
        id: WidgetId,
        update: WidgetUpdate,
        user_id: &UserId,
    ) -> Result<Widget, WidgetError>;

    /// Soft-deletes the widget. The row is retained with `is_deleted` set.
    async fn delete_widget(&self, id: WidgetId, user_id: &UserId) -> Result<(), WidgetError>;
}
