//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tgrelay_core::deploy::DeployError;
use tgrelay_shared::AppError;
use tracing::{error, warn};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Stable error code, e.g. `PAYLOAD_TOO_LARGE`.
    pub error: &'static str,
    /// Human-readable detail.
    pub error_detail: String,
}

/// Wrapper turning [`AppError`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.0.is_client_error() {
            warn!(code = self.0.error_code(), error = %self.0, "Request rejected");
        } else {
            error!(code = self.0.error_code(), error = %self.0, "Request failed");
        }

        let body = ErrorBody {
            success: false,
            error: self.0.error_code(),
            error_detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
