//! Webhook event ingestion

use std::sync::Arc;

use mb_core::{MessageRecord, MessageStore};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{FacebookError, Result};
use crate::hook::{LoggingHook, MessageHook};
use crate::webhook::{MessagingEvent, WebhookPayload};

/// Body returned to Facebook for every webhook delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WebhookAck {
    Ok,
    Error { message: String },
}

/// Counts of the events handled in one delivery
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub messages: usize,
    pub postbacks: usize,
    pub deliveries: usize,
    pub reads: usize,
    pub ignored: usize,
}

/// Processes webhook deliveries: stores messages and fans out to the hook
pub struct WebhookHandler {
    messages: Arc<dyn MessageStore>,
    hook: Arc<dyn MessageHook>,
}

impl WebhookHandler {
    /// Create a handler with the logging hook
    pub fn new(messages: Arc<dyn MessageStore>) -> Self {
        Self::with_hook(messages, Arc::new(LoggingHook))
    }

    pub fn with_hook(messages: Arc<dyn MessageStore>, hook: Arc<dyn MessageHook>) -> Self {
        Self { messages, hook }
    }

    /// Handle a delivery and always produce an acknowledgment.
    ///
    /// Facebook retries deliveries that are not acknowledged with a 2xx, so
    /// failures (including panics) end up in the body instead of the status.
    pub async fn acknowledge(self: &Arc<Self>, body: Vec<u8>) -> WebhookAck {
        let handler = Arc::clone(self);
        let outcome = tokio::spawn(async move { handler.process(&body).await }).await;

        match outcome {
            Ok(Ok(summary)) => {
                debug!("Webhook processed: {:?}", summary);
                WebhookAck::Ok
            }
            Ok(Err(e)) => {
                error!("Error processing webhook: {}", e);
                e.into()
            }
            Err(e) => {
                error!("Webhook processing aborted: {}", e);
                WebhookAck::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Parse and dispatch one delivery
    pub async fn process(&self, body: &[u8]) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        let Some(payload) = WebhookPayload::parse(body)? else {
            return Ok(summary);
        };

        for entry in &payload.entry {
            for raw in &entry.messaging {
                match MessagingEvent::classify(raw) {
                    MessagingEvent::Message(record) => {
                        info!(
                            "New message {:?} from {:?} to page {:?}",
                            record.message_id, record.sender_id, record.recipient_id
                        );
                        self.messages.append(record.clone()).await;
                        self.dispatch(record);
                        summary.messages += 1;
                    }
                    MessagingEvent::Postback { sender_id, payload } => {
                        info!("Postback from {:?}: {:?}", sender_id, payload);
                        summary.postbacks += 1;
                    }
                    MessagingEvent::Delivery { sender_id, mids } => {
                        info!("Messages delivered to {:?}: {:?}", sender_id, mids);
                        summary.deliveries += 1;
                    }
                    MessagingEvent::Read { sender_id, watermark } => {
                        info!("Messages read by {:?}, watermark {:?}", sender_id, watermark);
                        summary.reads += 1;
                    }
                    MessagingEvent::Unrecognized => {
                        debug!("Ignoring unrecognized messaging event: {}", raw);
                        summary.ignored += 1;
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Fire-and-forget call of the message hook
    fn dispatch(&self, record: MessageRecord) {
        let hook = Arc::clone(&self.hook);
        tokio::spawn(async move {
            if let Err(e) = hook.on_message(&record).await {
                warn!("Message hook failed for {:?}: {}", record.message_id, e);
            }
        });
    }
}

impl From<FacebookError> for WebhookAck {
    fn from(err: FacebookError) -> Self {
        WebhookAck::Error {
            message: err.to_string(),
        }
    }
}
