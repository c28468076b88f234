//! mb-facebook: Facebook Graph API and Messenger webhook support
//!
//! This crate provides the Graph API client used by the relay endpoints,
//! and the webhook side: verification handshake, event classification and
//! ingestion into the message buffer.

pub mod api;
pub mod error;
pub mod handler;
pub mod hook;
pub mod webhook;

pub use api::GraphApi;
pub use error::{FacebookError, GraphErrorDetail, Result};
pub use handler::{IngestSummary, WebhookAck, WebhookHandler};
pub use hook::{AutoReplyHook, LoggingHook, MessageHook};
pub use webhook::{verify_webhook, MessagingEvent, WebhookPayload};
