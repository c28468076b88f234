//! HTTP API handlers
//!
//! Webhook, OAuth and Graph relay endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use mb_core::{MessageRecord, StoredToken};
use mb_facebook::{verify_webhook as check_handshake, FacebookError, WebhookAck};

use crate::error::{ApiError, Result};
use crate::server::AppState;

const NO_PAGES_MESSAGE: &str =
    "No Facebook Pages found. Create a Facebook Page to access Messenger.";

// ============================================================================
// Request/Response types
// ============================================================================

/// Webhook handshake parameters (`hub.mode`, `hub.verify_token`, `hub.challenge`)
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode", alias = "hub_mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", alias = "hub_verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", alias = "hub_challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentMessagesQuery {
    pub page_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecentMessagesResponse {
    pub messages: Vec<MessageRecord>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
}

/// Body of `/api/exchange-token`
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessTokenQuery {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct PagesResponse {
    pub pages: Vec<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    pub access_token: String,
    pub page_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub access_token: String,
    pub page_id: String,
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageQuery {
    pub access_token: String,
    pub page_id: String,
    pub recipient_id: String,
    pub message_text: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub page_id: String,
    pub page_access_token: String,
}

// ============================================================================
// Handler functions
// ============================================================================

pub async fn root() -> Json<JsonValue> {
    Json(json!({ "message": "Facebook Messenger OAuth API" }))
}

/// Health check endpoint
pub async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "healthy" }))
}

/// Webhook verification handshake, echoes the challenge as plain text
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<String> {
    debug!("Webhook verification attempt, mode={:?}", params.mode);

    let challenge = check_handshake(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        &state.config.facebook.verify_token,
    )?;
    Ok(challenge)
}

/// Webhook event delivery. Always answers 200.
pub async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    debug!("Webhook received: {}", String::from_utf8_lossy(&body));
    Json(state.webhook.acknowledge(body.to_vec()).await)
}

/// Messages received through the webhook, optionally for one page
pub async fn recent_messages(
    State(state): State<AppState>,
    Query(query): Query<RecentMessagesQuery>,
) -> Json<RecentMessagesResponse> {
    let page_id = query.page_id.as_deref().filter(|id| !id.is_empty());
    let messages = state.messages.recent(page_id).await;
    let count = messages.len();
    Json(RecentMessagesResponse { messages, count })
}

/// Register a page with the app's webhook
pub async fn subscribe_page_webhook(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Json<JsonValue>> {
    let result = state
        .graph
        .subscribe_page(&query.page_id, &query.page_access_token)
        .await?;
    Ok(Json(result))
}

/// Redirect the browser to the Facebook OAuth dialog
pub async fn facebook_login(State(state): State<AppState>) -> Result<Redirect> {
    let url = state.graph.login_url()?;
    Ok(Redirect::temporary(&url))
}

/// OAuth callback: code -> user token -> profile, then back to the frontend
pub async fn facebook_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No authorization code provided".to_string()))?;

    let token_data = state.graph.exchange_code(&code).await?;
    let access_token = token_data
        .get("access_token")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| {
            ApiError::UpstreamRejected(format!("Failed to get access token: {}", token_data))
        })?
        .to_string();

    let profile = state.graph.get_profile(&access_token).await?;
    let user_id = profile
        .get("id")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ApiError::Internal(format!("User profile without id: {}", profile)))?
        .to_string();

    state
        .tokens
        .insert(StoredToken::new(&user_id, &access_token, profile))
        .await;
    info!("User {} logged in", user_id);

    let redirect = frontend_redirect(&state.config.frontend.url, &user_id, &access_token)?;
    Ok(Redirect::temporary(&redirect))
}

fn frontend_redirect(frontend_url: &str, user_id: &str, access_token: &str) -> Result<String> {
    let mut url = url::Url::parse(frontend_url)
        .map_err(|e| ApiError::Internal(format!("Invalid frontend URL: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("user_id", user_id)
        .append_pair("access_token", access_token)
        .append_pair("logged_in", "true");
    Ok(url.to_string())
}

/// Exchange a code obtained by the frontend and return the raw token response
pub async fn exchange_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<JsonValue>> {
    match state.graph.exchange_code(&req.code).await {
        Ok(token) => Ok(Json(token)),
        Err(FacebookError::UpstreamRejected { body, .. }) => Err(ApiError::UpstreamRejected(
            format!("Failed to exchange token: {}", body),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Pages managed by the user
pub async fn user_pages(
    State(state): State<AppState>,
    Query(query): Query<AccessTokenQuery>,
) -> Result<Json<PagesResponse>> {
    let pages = state.graph.list_pages(&query.access_token).await?;
    let message = pages.is_empty().then(|| NO_PAGES_MESSAGE.to_string());
    Ok(Json(PagesResponse { pages, message }))
}

/// Conversations of a page
pub async fn conversations(
    State(state): State<AppState>,
    Query(query): Query<ConversationsQuery>,
) -> Result<Json<JsonValue>> {
    let result = state
        .graph
        .list_conversations(&query.access_token, &query.page_id)
        .await?;
    Ok(Json(result))
}

/// Messages of a conversation
pub async fn messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<JsonValue>> {
    let result = state
        .graph
        .list_messages(&query.access_token, &query.page_id, &query.conversation_id)
        .await?;
    Ok(Json(result))
}

/// Send a message as one of the user's pages
pub async fn send_message(
    State(state): State<AppState>,
    Query(query): Query<SendMessageQuery>,
) -> Result<Json<JsonValue>> {
    info!(
        "Sending message from page {} to {}",
        query.page_id, query.recipient_id
    );
    let result = state
        .graph
        .send_message(
            &query.access_token,
            &query.page_id,
            &query.recipient_id,
            &query.message_text,
        )
        .await?;
    Ok(Json(result))
}
