use crate::domain::WidgetId;
use serde::Serialize;

/// A saved prompt together with its cached query and last rendered content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Widget {
    pub id: WidgetId,
    pub user_id: String,
    pub prompt: String,
    pub sql_query: Option<String>,
    pub content: Option<String>,
    pub created_at: String,
}

/// Partial update of a widget. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetUpdate {
    pub sql_query: Option<String>,
    pub content: Option<String>,
}

impl WidgetUpdate {
    #[must_use]
    pub fn query(sql_query: impl Into<String>) -> Self {
        Self {
            sql_query: Some(sql_query.into()),
            content: None,
        }
    }

    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            sql_query: None,
            content: Some(content.into()),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sql_query.is_none() && self.content.is_none()
    }
}
