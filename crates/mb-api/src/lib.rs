//! mb-api: HTTP surface of messenger-bridge
//!
//! Webhook endpoints for Facebook, OAuth login/callback, and the relay
//! endpoints used by the frontend. Built with axum.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{create_router, start_server, AppState};
