//! Route definitions
//!
//! Defines all HTTP API endpoints.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::handlers::{
    conversations, exchange_token, facebook_callback, facebook_login, health, messages,
    receive_webhook, recent_messages, root, send_message, subscribe_page_webhook, user_pages,
    verify_webhook,
};
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // Facebook webhook, deliveries are never refused for size
        .route(
            "/webhook",
            get(verify_webhook)
                .post(receive_webhook)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/api/recent-messages", get(recent_messages))
        .route("/api/subscribe-page-webhook", post(subscribe_page_webhook))
        // OAuth
        .route("/auth/facebook/login", get(facebook_login))
        .route("/auth/facebook/callback", get(facebook_callback))
        .route("/api/exchange-token", post(exchange_token))
        // Graph relay
        .route("/api/user/pages", get(user_pages))
        .route("/api/conversations", get(conversations))
        .route("/api/messages", get(messages))
        .route("/api/send-message", post(send_message))
}
