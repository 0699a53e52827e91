use axum::Json;
use axum::response::{IntoResponse, Response};
use cadabra_core::HttpError;
use cadabra_experiments::ExperimentError;
use http::StatusCode;

/// Error returned by every handler
///
/// Rendered as `{ "error": { "type": ..., "message": ... } }`.
#[derive(Debug)]
pub enum ApiError {
    Experiment(ExperimentError),
    BadRequest(String),
    Unauthorized(&'static str),
    Forbidden,
    Internal(String),
}

impl From<ExperimentError> for ApiError {
    fn from(e: ExperimentError) -> Self {
        Self::Experiment(e)
    }
}

impl From<cadabra_store::StoreError> for ApiError {
    fn from(e: cadabra_store::StoreError) -> Self {
        Self::Experiment(e.into())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &str, String) {
        match self {
            Self::Experiment(e) => (e.status_code(), e.error_type(), e.client_message()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "invalid_request_error", message.clone()),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "authentication_error", (*message).to_owned()),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "token is not allowed to use this endpoint".to_owned(),
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "an internal error occurred".to_owned(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Experiment(ref e) = self {
            if e.is_integrity_violation() {
                tracing::error!(error = %e, "integrity violation");
            } else if e.status_code().is_server_error() {
                tracing::error!(error = %e, "request failed");
            }
        }
        if let Self::Internal(ref detail) = self {
            tracing::error!(error = %detail, "request failed");
        }

        let (status, error_type, message) = self.parts();
        let body = serde_json::json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}
