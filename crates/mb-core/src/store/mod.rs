//! In-process state shared by the HTTP handlers
//!
//! Both stores live for the lifetime of the process and are injected into
//! the handlers through the application state. A multi-instance deployment
//! needs an external implementation of [`TokenStore`] / [`MessageStore`].

mod messages;
mod tokens;
mod types;

pub use messages::{InMemoryMessageBuffer, MessageStore, DEFAULT_BUFFER_CAPACITY};
pub use tokens::{InMemoryTokenStore, TokenStore};
pub use types::{MessageRecord, StoredToken};
