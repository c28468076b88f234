//! Bounded buffer of recently received messages

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::MessageRecord;

/// Number of messages kept in memory
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Storage for messages received through the webhook
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a record, evicting the oldest ones once the capacity is exceeded
    async fn append(&self, record: MessageRecord);

    /// Records in arrival order, optionally only those sent to `recipient_id`
    async fn recent(&self, recipient_id: Option<&str>) -> Vec<MessageRecord>;

    async fn len(&self) -> usize;
}

/// FIFO ring buffer held in process memory
#[derive(Debug, Clone)]
pub struct InMemoryMessageBuffer {
    capacity: usize,
    messages: Arc<RwLock<VecDeque<MessageRecord>>>,
}

impl Default for InMemoryMessageBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }
}

impl InMemoryMessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding at most `capacity` records (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageBuffer {
    async fn append(&self, record: MessageRecord) {
        // append and trim under one guard
        let mut messages = self.messages.write().await;
        messages.push_back(record);
        while messages.len() > self.capacity {
            if let Some(evicted) = messages.pop_front() {
                debug!("Evicted message {:?} from buffer", evicted.message_id);
            }
        }
    }

    async fn recent(&self, recipient_id: Option<&str>) -> Vec<MessageRecord> {
        let messages = self.messages.read().await;
        match recipient_id {
            Some(id) => messages
                .iter()
                .filter(|m| m.recipient_id.as_deref() == Some(id))
                .cloned()
                .collect(),
            None => messages.iter().cloned().collect(),
        }
    }

    async fn len(&self) -> usize {
        self.messages.read().await.len()
    }
}
