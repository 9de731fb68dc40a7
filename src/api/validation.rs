use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};

use super::ApiError;
use crate::domain::WidgetId;

/// `Json` whose rejections render as a 400 in the API envelope instead of
/// axum's plain-text 415/422.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

pub fn validate_widget_id(id: i32) -> Result<WidgetId, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid widget ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(WidgetId::new(id))
}

/// Table names arrive in paths and form fields and end up quoted inside SQL
/// text, so only plain identifiers are accepted.
pub fn validate_table_name(name: &str) -> Result<&str, ApiError> {
    const MAX_LENGTH: usize = 64;

    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Table name cannot be empty"));
    }

    if name.len() > MAX_LENGTH {
        return Err(ApiError::validation(format!(
            "Table name must be {MAX_LENGTH} characters or less"
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::validation(
            "Table name can only contain letters, numbers and underscores",
        ));
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_widget_id() {
        assert_eq!(validate_widget_id(3).unwrap(), WidgetId::new(3));
        assert!(validate_widget_id(0).is_err());
        assert!(validate_widget_id(-1).is_err());
    }

    #[test]
    fn test_validate_table_name() {
        assert_eq!(validate_table_name(" order_items ").unwrap(), "order_items");
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("rooms; DROP TABLE users").is_err());
        assert!(validate_table_name(&"t".repeat(65)).is_err());
    }
}
