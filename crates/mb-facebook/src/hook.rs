//! Reactions to received messages

use async_trait::async_trait;
use mb_core::{AutoReplyConfig, MessageRecord};
use tracing::{debug, info};

use crate::api::GraphApi;
use crate::error::Result;

/// Called for every message received through the webhook.
///
/// Runs detached from the webhook request; errors are only logged.
#[async_trait]
pub trait MessageHook: Send + Sync {
    async fn on_message(&self, record: &MessageRecord) -> Result<()>;
}

/// Default hook, logs the message and does nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHook;

#[async_trait]
impl MessageHook for LoggingHook {
    async fn on_message(&self, record: &MessageRecord) -> Result<()> {
        info!(
            "Processing message from {:?}: {:?}",
            record.sender_id, record.message_text
        );
        Ok(())
    }
}

/// Replies with a fixed text when a message contains a keyword
#[derive(Clone)]
pub struct AutoReplyHook {
    api: GraphApi,
    page_access_token: String,
    keyword: String,
    reply_text: String,
}

impl AutoReplyHook {
    pub fn new(
        api: GraphApi,
        page_access_token: impl Into<String>,
        keyword: &str,
        reply_text: impl Into<String>,
    ) -> Self {
        Self {
            api,
            page_access_token: page_access_token.into(),
            keyword: keyword.to_lowercase(),
            reply_text: reply_text.into(),
        }
    }

    /// Build from config; `None` when no page token is configured
    pub fn from_config(api: GraphApi, config: &AutoReplyConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        let token = config.page_access_token.clone()?;
        Some(Self::new(api, token, &config.keyword, config.reply_text.clone()))
    }

    fn matches(&self, text: &str) -> bool {
        !self.keyword.is_empty() && text.to_lowercase().contains(&self.keyword)
    }
}

#[async_trait]
impl MessageHook for AutoReplyHook {
    async fn on_message(&self, record: &MessageRecord) -> Result<()> {
        let (Some(sender_id), Some(text)) = (&record.sender_id, &record.message_text) else {
            return Ok(());
        };

        if !self.matches(text) {
            debug!("No auto-reply keyword in message from {}", sender_id);
            return Ok(());
        }

        self.api
            .send_with_page_token(&self.page_access_token, sender_id, &self.reply_text)
            .await?;
        info!("Auto-reply sent to {}", sender_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_core::FacebookConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(text: Option<&str>) -> MessageRecord {
        MessageRecord {
            sender_id: Some("U1".to_string()),
            recipient_id: Some("P1".to_string()),
            message_id: Some("M1".to_string()),
            message_text: text.map(str::to_string),
            attachments: None,
            timestamp: Some(1),
        }
    }

    fn hook_for(server: &MockServer) -> AutoReplyHook {
        let api = GraphApi::new(&FacebookConfig {
            graph_api_url: server.uri(),
            ..Default::default()
        });
        AutoReplyHook::new(api, "page-token", "Hello", "Hi there!")
    }

    #[tokio::test]
    async fn test_logging_hook() {
        assert!(LoggingHook.on_message(&record(Some("x"))).await.is_ok());
    }

    #[tokio::test]
    async fn test_auto_reply_on_keyword() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/me/messages"))
            .and(query_param("access_token", "page-token"))
            .and(body_json(json!({
                "recipient": {"id": "U1"},
                "message": {"text": "Hi there!"},
                "messaging_type": "RESPONSE"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "m"})))
            .expect(1)
            .mount(&server)
            .await;

        hook_for(&server)
            .on_message(&record(Some("well HELLO friend")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_auto_reply_ignores_other_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let hook = hook_for(&server);
        hook.on_message(&record(Some("goodbye"))).await.unwrap();
        hook.on_message(&record(None)).await.unwrap();
    }

    #[test]
    fn test_from_config() {
        let api = GraphApi::new(&FacebookConfig::default());
        assert!(AutoReplyHook::from_config(api.clone(), &AutoReplyConfig::default()).is_none());

        let config = AutoReplyConfig {
            page_access_token: Some("token".to_string()),
            ..Default::default()
        };
        let hook = AutoReplyHook::from_config(api, &config).unwrap();
        assert!(hook.matches("hello!"));
        assert!(!hook.matches("bye"));
    }
}
