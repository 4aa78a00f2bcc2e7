//! Requester identity
//!
//! Authentication happens in front of this service; the gateway forwards
//! the authenticated user id in `X-User-Id`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::ApiResponse;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user id taken from the `X-User-Id` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterId(pub String);

impl<S> FromRequestParts<S> for RequesterId
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| RequesterId(v.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ApiResponse::<()>::error("missing X-User-Id header")),
                )
                    .into_response()
            })
    }
}
