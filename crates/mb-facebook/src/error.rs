//! Error types for mb-facebook

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// mb-facebook error type
#[derive(Error, Debug)]
pub enum FacebookError {
    #[error("Facebook webhook verification failed")]
    WebhookVerificationFailed,

    /// Non-success answer from the Graph API, raw body attached
    #[error("{context}: {body}")]
    UpstreamRejected {
        context: String,
        status: u16,
        body: String,
    },

    #[error("Page {page_id} not found. Available pages: {available:?}")]
    PageNotFound {
        page_id: String,
        available: Vec<String>,
    },

    #[error("Request to Facebook API timed out")]
    Timeout,

    /// Send call answered with an `error` object
    #[error("Facebook rejected the message: {}", .0.message)]
    SendRejected(GraphErrorDetail),

    #[error("{0}")]
    Request(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FacebookError {
    /// Classify a transport failure, keeping timeouts distinct
    pub(crate) fn transport(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FacebookError::Timeout
        } else {
            FacebookError::Request(format!("{}: {}", context, err))
        }
    }
}

impl From<reqwest::Error> for FacebookError {
    fn from(err: reqwest::Error) -> Self {
        FacebookError::transport("Facebook API request failed", err)
    }
}

/// Structured Graph API error, surfaced verbatim to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: JsonValue,
    pub error_subcode: JsonValue,
    pub fbtrace_id: String,
}

impl GraphErrorDetail {
    /// Build from the `error` object of a Graph response.
    ///
    /// Missing fields fall back to `"Unknown error"`, `"Unknown"` and `"N/A"`.
    pub fn from_error_value(error: &JsonValue) -> Self {
        let text = |key: &str, default: &str| match error.get(key) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        };
        let raw = |key: &str| match error.get(key) {
            Some(JsonValue::Null) | None => JsonValue::String("N/A".to_string()),
            Some(value) => value.clone(),
        };

        Self {
            message: text("message", "Unknown error"),
            error_type: text("type", "Unknown"),
            code: raw("code"),
            error_subcode: raw("error_subcode"),
            fbtrace_id: text("fbtrace_id", "N/A"),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FacebookError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_graph_error_detail_full() {
        let detail = GraphErrorDetail::from_error_value(&json!({
            "message": "(#100) No matching user found",
            "type": "OAuthException",
            "code": 100,
            "error_subcode": 2018001,
            "fbtrace_id": "AbCdEf"
        }));

        assert_eq!(detail.message, "(#100) No matching user found");
        assert_eq!(detail.error_type, "OAuthException");
        assert_eq!(detail.code, json!(100));
        assert_eq!(detail.error_subcode, json!(2018001));
        assert_eq!(detail.fbtrace_id, "AbCdEf");

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["type"], "OAuthException");
    }

    #[test]
    fn test_graph_error_detail_defaults() {
        let detail = GraphErrorDetail::from_error_value(&json!({}));
        assert_eq!(detail.message, "Unknown error");
        assert_eq!(detail.error_type, "Unknown");
        assert_eq!(detail.code, json!("N/A"));
        assert_eq!(detail.error_subcode, json!("N/A"));
        assert_eq!(detail.fbtrace_id, "N/A");
    }

    #[test]
    fn test_page_not_found_message() {
        let err = FacebookError::PageNotFound {
            page_id: "P9".to_string(),
            available: vec!["P1".to_string(), "P2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            r#"Page P9 not found. Available pages: ["P1", "P2"]"#
        );
    }

    #[test]
    fn test_upstream_rejected_message() {
        let err = FacebookError::UpstreamRejected {
            context: "Failed to get access token".to_string(),
            status: 400,
            body: "{\"error\":{}}".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to get access token: {\"error\":{}}");
    }
}
