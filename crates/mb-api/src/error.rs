//! エラー型定義 (mb-api)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mb_facebook::{FacebookError, GraphErrorDetail};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// mb-api のエラー型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Verification failed")]
    VerificationFailed,

    #[error("{0}")]
    BadRequest(String),

    /// Graph API answered with a non-success status
    #[error("{0}")]
    UpstreamRejected(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Request to Facebook API timed out")]
    GatewayTimeout,

    /// Send call rejected with a structured Graph error
    #[error("{}", .0.message)]
    SendRejected(GraphErrorDetail),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::VerificationFailed => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_)
            | ApiError::UpstreamRejected(_)
            | ApiError::SendRejected(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FacebookError> for ApiError {
    fn from(err: FacebookError) -> Self {
        match err {
            FacebookError::WebhookVerificationFailed => ApiError::VerificationFailed,
            FacebookError::UpstreamRejected { .. } => ApiError::UpstreamRejected(err.to_string()),
            FacebookError::PageNotFound { .. } => ApiError::NotFound(err.to_string()),
            FacebookError::Timeout => ApiError::GatewayTimeout,
            FacebookError::SendRejected(detail) => ApiError::SendRejected(detail),
            FacebookError::Request(_)
            | FacebookError::Config(_)
            | FacebookError::InvalidPayload(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} - {}", status, self);
        }

        let detail = match &self {
            ApiError::SendRejected(detail) => json!(detail),
            other => json!(other.to_string()),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, ApiError>;
