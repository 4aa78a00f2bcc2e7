//! Mapping of domain errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::ApiResponse;
use crate::domain::DomainError;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wraps a [`DomainError`] so handlers can use `?`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::InvalidWindow(_) | DomainError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Conflict { .. }
        | DomainError::SpotDisabled(_)
        | DomainError::AlreadyCancelled(_)
        | DomainError::InvalidTransition { .. }
        | DomainError::AlreadyPaid(_)
        | DomainError::StaleWrite(_) => StatusCode::CONFLICT,
        DomainError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if !self.0.is_business() {
            error!(error = %self.0, status = status.as_u16(), "Request failed");
        }
        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_client_statuses() {
        assert_eq!(
            status_for(&DomainError::InvalidWindow("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DomainError::Conflict {
                spot_id: "A1".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&DomainError::not_found("reservation", "r1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DomainError::Forbidden("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&DomainError::AlreadyCancelled("r1".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn storage_failures_are_unavailable() {
        assert_eq!(
            status_for(&DomainError::Persistence("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
