//! mb-core: messenger-bridge core library
//!
//! Configuration, error types and the in-process stores shared by the
//! webhook receiver and the Graph API relay.

pub mod config;
pub mod error;
pub mod store;

pub use config::{ApiConfig, AutoReplyConfig, Config, FacebookConfig, FrontendConfig};
pub use error::{Error, Result};
pub use store::{
    InMemoryMessageBuffer, InMemoryTokenStore, MessageRecord, MessageStore, StoredToken,
    TokenStore, DEFAULT_BUFFER_CAPACITY,
};
