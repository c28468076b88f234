//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use axum::http::HeaderValue;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use mb_core::{Config, InMemoryMessageBuffer, InMemoryTokenStore, MessageStore, TokenStore};
use mb_facebook::{AutoReplyHook, GraphApi, LoggingHook, MessageHook, WebhookHandler};

use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub graph: GraphApi,
    pub tokens: Arc<dyn TokenStore>,
    pub messages: Arc<dyn MessageStore>,
    pub webhook: Arc<WebhookHandler>,
}

impl AppState {
    /// Build the state with in-process stores
    pub fn new(config: Config) -> Self {
        Self::with_stores(
            config,
            Arc::new(InMemoryTokenStore::new()),
            Arc::new(InMemoryMessageBuffer::new()),
        )
    }

    /// Build the state around externally provided stores
    pub fn with_stores(
        config: Config,
        tokens: Arc<dyn TokenStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        let graph = GraphApi::new(&config.facebook);

        let hook: Arc<dyn MessageHook> =
            match AutoReplyHook::from_config(graph.clone(), &config.auto_reply) {
                Some(hook) => {
                    info!("Auto-reply enabled for keyword {:?}", config.auto_reply.keyword);
                    Arc::new(hook)
                }
                None => Arc::new(LoggingHook),
            };

        let webhook = Arc::new(WebhookHandler::with_hook(Arc::clone(&messages), hook));

        Self {
            config: Arc::new(config),
            graph,
            tokens,
            messages,
            webhook,
        }
    }
}

/// CORS for the configured frontend origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the full router with middleware
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.api.allowed_origins);

    Router::new()
        .merge(routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let port = config.api.port;
    let app = create_router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("HTTP API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
