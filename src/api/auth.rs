//! Caller identity.
//!
//! The upstream identity layer sends the user id in the `X-User-ID` header.
//! The middleware parses it once and hands it to handlers as an
//! [`Extension<UserId>`](axum::Extension).

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use super::ApiError;
use crate::constants::http::USER_ID_HEADER;
use crate::constants::limits::MAX_USER_ID_LENGTH;
use crate::domain::UserId;

fn extract_user_id(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|raw| raw.len() <= MAX_USER_ID_LENGTH)
        .and_then(UserId::parse)
}

pub async fn user_id_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let user_id = extract_user_id(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;

    tracing::Span::current().record("user_id", user_id.as_str());
    request.extensions_mut().insert(user_id);

    Ok(next.run(request).await)
}
