use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// User access token obtained through the OAuth callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub user_id: String,
    pub access_token: String,
    /// Profile returned by `/me`, kept as-is
    pub user_profile: JsonValue,
    pub stored_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(user_id: &str, access_token: &str, user_profile: JsonValue) -> Self {
        Self {
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
            user_profile,
            stored_at: Utc::now(),
        }
    }
}

/// A message event received through the webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender_id: Option<String>,
    pub recipient_id: Option<String>,
    pub message_id: Option<String>,
    pub message_text: Option<String>,
    pub attachments: Option<JsonValue>,
    pub timestamp: Option<i64>,
}
