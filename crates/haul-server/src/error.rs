use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use haul_core::AppError;

use crate::dto::ErrorResponse;

/// Wrapper so we can implement `IntoResponse` for `AppError`.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            AppError::UnsupportedProvider(_) => (StatusCode::BAD_REQUEST, "unsupported_provider"),
            AppError::InvalidCredential(_) => (StatusCode::BAD_REQUEST, "invalid_credential"),
            AppError::SerializationError(_) => (StatusCode::BAD_REQUEST, "serialization_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::NotReady(_) => (StatusCode::CONFLICT, "not_ready"),
            AppError::Gone(_) => (StatusCode::GONE, "gone"),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            AppError::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AppError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.0.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(AppError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AppError::UnsupportedProvider("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::NotReady("processing".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::Gone("x".into())), StatusCode::GONE);
        assert_eq!(status_of(AppError::Timeout(900)), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_of(AppError::Generic("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
