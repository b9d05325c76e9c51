use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use powchain_core::CoreError;
use powchain_wallet::WalletError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced by request handlers. Every variant becomes a response; none of
/// them takes the process down.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("no wallet has been created yet")]
    WalletNotInitialized,

    #[error("invalid verification input: {0}")]
    VerificationInput(String),

    #[error("not found")]
    NotFound,

    #[error("payload cannot be serialized: {0}")]
    Serialization(String),

    #[error("mining aborted, block discarded")]
    MiningAborted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedRequest(_)
            | ApiError::WalletNotInitialized
            | ApiError::VerificationInput(_)
            | ApiError::Serialization(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MiningAborted => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MiningAborted => ApiError::MiningAborted,
            CoreError::Serialization(e) => ApiError::Serialization(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        ApiError::VerificationInput(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::NotFound => return (status, "Not Found").into_response(),
            ApiError::Internal(msg) => error!(%msg, "request failed"),
            other => warn!(error = %other, "request rejected"),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
