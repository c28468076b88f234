//! Messenger webhook payloads
//!
//! Push events arrive as `{"object": "page", "entry": [{"messaging": [...]}]}`.
//! Each messaging event carries exactly one of `message`, `postback`,
//! `delivery` or `read`; [`MessagingEvent::classify`] turns the raw JSON into
//! one of those variants.

use mb_core::MessageRecord;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{FacebookError, Result};

/// `object` value of page subscriptions
pub const PAGE_OBJECT: &str = "page";

/// Check the verification handshake sent by Facebook when the webhook is registered
pub fn verify_webhook(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    verify_token: &str,
) -> Result<String> {
    if mode == Some("subscribe") && token == Some(verify_token) {
        info!("Webhook verified successfully");
        Ok(challenge.unwrap_or_default().to_string())
    } else {
        warn!("Webhook verification failed: mode={:?}", mode);
        Err(FacebookError::WebhookVerificationFailed)
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

impl WebhookPayload {
    /// Parse a delivery body.
    ///
    /// Returns `None` for envelopes whose `object` is not `"page"`, whatever
    /// the rest of their shape. The body itself must be a JSON object.
    pub fn parse(body: &[u8]) -> Result<Option<Self>> {
        let value: JsonValue = serde_json::from_slice(body).map_err(invalid)?;

        let Some(envelope) = value.as_object() else {
            return Err(FacebookError::InvalidPayload(
                "expected a JSON object".to_string(),
            ));
        };

        match envelope.get("object") {
            Some(JsonValue::String(object)) if object == PAGE_OBJECT => {}
            object => {
                debug!("Ignoring webhook for object {:?}", object);
                return Ok(None);
            }
        }

        serde_json::from_value(value).map(Some).map_err(invalid)
    }
}

fn invalid(err: serde_json::Error) -> FacebookError {
    FacebookError::InvalidPayload(err.to_string())
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    pub id: Option<String>,
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<JsonValue>,
}

/// A classified messaging event
#[derive(Debug, Clone, PartialEq)]
pub enum MessagingEvent {
    Message(MessageRecord),
    Postback {
        sender_id: Option<String>,
        payload: Option<String>,
    },
    Delivery {
        sender_id: Option<String>,
        mids: Vec<String>,
    },
    Read {
        sender_id: Option<String>,
        watermark: Option<i64>,
    },
    Unrecognized,
}

impl MessagingEvent {
    /// Classify a raw messaging event.
    ///
    /// Keys are checked in the order message, postback, delivery, read; a key
    /// only counts when its value is non-empty.
    pub fn classify(event: &JsonValue) -> Self {
        let sender_id = nested_id(event, "sender");

        if let Some(message) = present(event, "message") {
            return MessagingEvent::Message(MessageRecord {
                sender_id,
                recipient_id: nested_id(event, "recipient"),
                message_id: string_field(message, "mid"),
                message_text: string_field(message, "text"),
                attachments: message.get("attachments").filter(|v| !v.is_null()).cloned(),
                timestamp: event.get("timestamp").and_then(JsonValue::as_i64),
            });
        }

        if let Some(postback) = present(event, "postback") {
            return MessagingEvent::Postback {
                sender_id,
                payload: string_field(postback, "payload"),
            };
        }

        if let Some(delivery) = present(event, "delivery") {
            let mids = delivery
                .get("mids")
                .and_then(JsonValue::as_array)
                .map(|mids| {
                    mids.iter()
                        .filter_map(|m| m.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            return MessagingEvent::Delivery { sender_id, mids };
        }

        if let Some(read) = present(event, "read") {
            return MessagingEvent::Read {
                sender_id,
                watermark: read.get("watermark").and_then(JsonValue::as_i64),
            };
        }

        MessagingEvent::Unrecognized
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MessagingEvent::Message(_) => "message",
            MessagingEvent::Postback { .. } => "postback",
            MessagingEvent::Delivery { .. } => "delivery",
            MessagingEvent::Read { .. } => "read",
            MessagingEvent::Unrecognized => "unrecognized",
        }
    }
}

/// Value under `key` if it is set and not empty
fn present<'a>(event: &'a JsonValue, key: &str) -> Option<&'a JsonValue> {
    event.get(key).filter(|value| match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
        JsonValue::Number(_) => true,
    })
}

fn nested_id(event: &JsonValue, key: &str) -> Option<String> {
    event
        .get(key)
        .and_then(|party| party.get("id"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

fn string_field(value: &JsonValue, key: &str) -> Option<String> {
    value.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verify_webhook() {
        assert_eq!(
            verify_webhook(Some("subscribe"), Some("secret"), Some("1158201444"), "secret").unwrap(),
            "1158201444"
        );
    }

    #[test]
    fn test_verify_webhook_echoes_challenge_verbatim() {
        let challenge = "  spaced & <odd> ✓ ";
        assert_eq!(
            verify_webhook(Some("subscribe"), Some("secret"), Some(challenge), "secret").unwrap(),
            challenge
        );
    }

    #[test]
    fn test_verify_webhook_rejects_mismatch() {
        let cases = [
            (Some("subscribe"), Some("wrong")),
            (Some("unsubscribe"), Some("secret")),
            (Some("SUBSCRIBE"), Some("secret")),
            (None, Some("secret")),
            (Some("subscribe"), None),
            (None, None),
        ];
        for (mode, token) in cases {
            let result = verify_webhook(mode, token, Some("c"), "secret");
            assert!(
                matches!(result, Err(FacebookError::WebhookVerificationFailed)),
                "mode={:?} token={:?}",
                mode,
                token
            );
        }
    }

    #[test]
    fn test_payload_parsing() {
        let payload = WebhookPayload::parse(
            br#"{
                "object": "page",
                "entry": [{
                    "id": "123456789",
                    "time": 1458692752478,
                    "messaging": [{
                        "sender": {"id": "user123"},
                        "recipient": {"id": "page123"},
                        "timestamp": 1234567890,
                        "message": {"mid": "mid.123", "text": "Hello"}
                    }]
                }]
            }"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(payload.object.as_deref(), Some("page"));
        assert_eq!(payload.entry.len(), 1);
        assert_eq!(payload.entry[0].messaging.len(), 1);
    }

    #[test]
    fn test_payload_without_entries() {
        let payload = WebhookPayload::parse(br#"{"object": "page"}"#)
            .unwrap()
            .unwrap();
        assert!(payload.entry.is_empty());
    }

    #[test]
    fn test_non_page_envelopes_are_skipped_before_shape_checks() {
        for body in [
            r#"{"object": "instagram"}"#,
            r#"{"object": "instagram", "entry": "x"}"#,
            r#"{"object": 5}"#,
            r#"{"entry": [{"messaging": []}]}"#,
        ] {
            assert!(WebhookPayload::parse(body.as_bytes()).unwrap().is_none(), "{}", body);
        }
    }

    #[test]
    fn test_payload_invalid() {
        for body in [&b"not json"[..], b"[1,2,3]", b"\"page\"", br#"{"object": "page", "entry": "x"}"#] {
            assert!(matches!(
                WebhookPayload::parse(body),
                Err(FacebookError::InvalidPayload(_))
            ));
        }
    }

    #[test]
    fn test_classify_message() {
        let event = json!({
            "sender": {"id": "U1"},
            "recipient": {"id": "P1"},
            "timestamp": 123,
            "message": {
                "mid": "M1",
                "text": "hi",
                "attachments": [{"type": "image", "payload": {"url": "https://x"}}]
            }
        });

        match MessagingEvent::classify(&event) {
            MessagingEvent::Message(record) => {
                assert_eq!(record.sender_id.as_deref(), Some("U1"));
                assert_eq!(record.recipient_id.as_deref(), Some("P1"));
                assert_eq!(record.message_id.as_deref(), Some("M1"));
                assert_eq!(record.message_text.as_deref(), Some("hi"));
                assert_eq!(record.timestamp, Some(123));
                assert_eq!(record.attachments.unwrap()[0]["type"], "image");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_classify_postback_delivery_read() {
        let postback = json!({
            "sender": {"id": "U1"},
            "postback": {"title": "Start", "payload": "GET_STARTED"}
        });
        assert_eq!(
            MessagingEvent::classify(&postback),
            MessagingEvent::Postback {
                sender_id: Some("U1".to_string()),
                payload: Some("GET_STARTED".to_string()),
            }
        );

        let delivery = json!({
            "sender": {"id": "U1"},
            "delivery": {"mids": ["m1", "m2"], "watermark": 1}
        });
        assert_eq!(
            MessagingEvent::classify(&delivery),
            MessagingEvent::Delivery {
                sender_id: Some("U1".to_string()),
                mids: vec!["m1".to_string(), "m2".to_string()],
            }
        );

        let read = json!({"sender": {"id": "U1"}, "read": {"watermark": 1458668856253i64}});
        assert_eq!(
            MessagingEvent::classify(&read),
            MessagingEvent::Read {
                sender_id: Some("U1".to_string()),
                watermark: Some(1458668856253),
            }
        );
    }

    #[test]
    fn test_classify_precedence_and_unknown() {
        let both = json!({"message": {"mid": "M1"}, "read": {"watermark": 1}});
        assert_eq!(MessagingEvent::classify(&both).kind(), "message");

        let empty_message = json!({"message": {}, "read": {"watermark": 1}});
        assert_eq!(MessagingEvent::classify(&empty_message).kind(), "read");

        assert_eq!(
            MessagingEvent::classify(&json!({"optin": {"ref": "x"}})),
            MessagingEvent::Unrecognized
        );
        assert_eq!(MessagingEvent::classify(&json!("string")), MessagingEvent::Unrecognized);
        assert_eq!(MessagingEvent::classify(&json!(null)), MessagingEvent::Unrecognized);
    }
}
