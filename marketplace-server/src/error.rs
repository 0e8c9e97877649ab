//! HTTP mapping of engine errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use marketplace_core::Error;

/// Engine error as returned from a route
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Error::AuthorizationDenied(reason) => {
                tracing::warn!("Authorization denied: {}", reason);
                StatusCode::FORBIDDEN
            }
            Error::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ConflictOrStale(_) => StatusCode::CONFLICT,
            Error::TransientStoreFailure(msg) => {
                tracing::error!("Store failure: {}", msg);
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let reason = match &self.0 {
            Error::TransientStoreFailure(_) => "Service temporarily unavailable, please retry".to_string(),
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "reason": reason,
            "retryable": self.0.is_retryable(),
        });
        (status, axum::Json(body)).into_response()
    }
}
