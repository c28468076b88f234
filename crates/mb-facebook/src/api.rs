//! Facebook Graph API client

use std::time::Duration;

use mb_core::FacebookConfig;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use crate::error::{FacebookError, GraphErrorDetail, Result};

/// OAuth dialog host
const FACEBOOK_DIALOG_URL: &str = "https://www.facebook.com";

/// Fields requested from `/me` after login
const PROFILE_FIELDS: &str = "id,name,email";

/// Fields requested when listing a page's conversations
const CONVERSATION_FIELDS: &str = "participants,updated_time,message_count,snippet";

/// Fields requested when listing a conversation's messages
const MESSAGE_FIELDS: &str = "messages{message,from,created_time,id}";

/// Push events a page is subscribed to
const SUBSCRIBED_FIELDS: &str = "messages,messaging_postbacks,message_deliveries,message_reads";

/// Graph API client
#[derive(Clone)]
pub struct GraphApi {
    client: Client,
    base_url: String,
    dialog_url: String,
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    send_timeout: Duration,
}

impl GraphApi {
    /// Create a new Graph API client from the app configuration
    pub fn new(config: &FacebookConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.graph_base_url(),
            dialog_url: format!(
                "{}/{}/dialog/oauth",
                FACEBOOK_DIALOG_URL, config.graph_api_version
            ),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.oauth_scopes.clone(),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
        }
    }

    /// Override the send timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// URL of the OAuth dialog the browser is redirected to
    pub fn login_url(&self) -> Result<String> {
        let scope = self.scopes.join(",");
        let url = url::Url::parse_with_params(
            &self.dialog_url,
            &[
                ("client_id", self.app_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("response_type", "code"),
            ],
        )
        .map_err(|e| FacebookError::Config(format!("Invalid OAuth dialog URL: {}", e)))?;

        Ok(url.to_string())
    }

    /// Exchange an authorization code for a user access token.
    ///
    /// Returns the raw token response (`access_token`, `token_type`, `expires_in`).
    pub async fn exchange_code(&self, code: &str) -> Result<JsonValue> {
        let url = format!("{}/oauth/access_token", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        let token = Self::json_or_reject(response, "Failed to get access token").await?;
        info!("Exchanged authorization code for access token");
        Ok(token)
    }

    /// Fetch the profile of the identity owning `access_token`
    pub async fn get_profile(&self, access_token: &str) -> Result<JsonValue> {
        let url = format!("{}/me", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("fields", PROFILE_FIELDS), ("access_token", access_token)])
            .send()
            .await?;

        let profile = Self::json_or_reject(response, "Failed to fetch user profile").await?;
        debug!("Got user profile: {}", profile);
        Ok(profile)
    }

    /// List the pages managed by the user
    pub async fn list_pages(&self, access_token: &str) -> Result<Vec<JsonValue>> {
        let url = format!("{}/me/accounts", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("access_token", access_token)])
            .send()
            .await?;

        let body = Self::json_or_reject(response, "Failed to fetch pages").await?;
        let pages = match body.get("data") {
            Some(JsonValue::Array(pages)) => pages.clone(),
            _ => Vec::new(),
        };
        debug!("Fetched {} pages", pages.len());
        Ok(pages)
    }

    /// Look up the page-scoped access token for `page_id`.
    ///
    /// Runs on every call; page tokens are never cached.
    pub async fn resolve_page_token(&self, access_token: &str, page_id: &str) -> Result<String> {
        let url = format!("{}/me/accounts", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|e| FacebookError::transport("Failed to fetch pages", e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| FacebookError::transport("Failed to fetch pages", e))?;
        let parsed = serde_json::from_str::<PagesResponse>(&raw);

        if let Ok(PagesResponse {
            error: Some(err), ..
        }) = &parsed
        {
            warn!("Graph API error while listing pages: {}", err);
            return Err(FacebookError::UpstreamRejected {
                context: "Facebook API Error".to_string(),
                status: status.as_u16(),
                body: err.to_string(),
            });
        }

        if !status.is_success() {
            error!("Facebook API error: {} - {}", status, raw);
            return Err(FacebookError::UpstreamRejected {
                context: "Failed to fetch pages".to_string(),
                status: status.as_u16(),
                body: raw,
            });
        }

        let body = parsed
            .map_err(|e| FacebookError::Request(format!("Failed to fetch pages: {}", e)))?;

        let available: Vec<String> = body.data.iter().map(|p| p.id.clone()).collect();
        let token = body
            .data
            .into_iter()
            .find(|p| p.id == page_id)
            .and_then(|p| p.access_token);

        match token {
            Some(token) => {
                debug!("Resolved page token for {}", page_id);
                Ok(token)
            }
            None => {
                warn!("Page {} not found among {:?}", page_id, available);
                Err(FacebookError::PageNotFound {
                    page_id: page_id.to_string(),
                    available,
                })
            }
        }
    }

    /// List the conversations of a page
    pub async fn list_conversations(&self, access_token: &str, page_id: &str) -> Result<JsonValue> {
        let page_token = self.resolve_page_token(access_token, page_id).await?;
        let url = format!("{}/{}/conversations", self.base_url, page_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", CONVERSATION_FIELDS),
                ("access_token", page_token.as_str()),
            ])
            .send()
            .await?;

        Self::json_or_reject(response, "Failed to fetch conversations").await
    }

    /// List the messages of a conversation owned by a page
    pub async fn list_messages(
        &self,
        access_token: &str,
        page_id: &str,
        conversation_id: &str,
    ) -> Result<JsonValue> {
        let page_token = self.resolve_page_token(access_token, page_id).await?;
        let url = format!("{}/{}", self.base_url, conversation_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", MESSAGE_FIELDS),
                ("access_token", page_token.as_str()),
            ])
            .send()
            .await?;

        Self::json_or_reject(response, "Failed to fetch messages").await
    }

    /// Send a text message on behalf of a page the user manages
    pub async fn send_message(
        &self,
        access_token: &str,
        page_id: &str,
        recipient_id: &str,
        text: &str,
    ) -> Result<JsonValue> {
        let page_token = self.resolve_page_token(access_token, page_id).await?;
        self.send_with_page_token(&page_token, recipient_id, text).await
    }

    /// Send a text message with an already resolved page token
    pub async fn send_with_page_token(
        &self,
        page_token: &str,
        recipient_id: &str,
        text: &str,
    ) -> Result<JsonValue> {
        let url = format!("{}/me/messages", self.base_url);

        let payload = SendMessagePayload {
            recipient: Recipient {
                id: recipient_id.to_string(),
            },
            message: MessageText {
                text: text.to_string(),
            },
            messaging_type: "RESPONSE".to_string(),
        };

        debug!("Sending message to {}", recipient_id);

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", page_token)])
            .json(&payload)
            .timeout(self.send_timeout)
            .send()
            .await
            .map_err(|e| FacebookError::transport("Failed to send message", e))?;

        let status = response.status();
        let result: JsonValue = response
            .json()
            .await
            .map_err(|e| FacebookError::transport("Failed to send message", e))?;

        if let Some(err) = result.get("error") {
            let detail = GraphErrorDetail::from_error_value(err);
            error!(
                "Send rejected by Facebook: {} ({})",
                detail.message, detail.fbtrace_id
            );
            return Err(FacebookError::SendRejected(detail));
        }

        if !status.is_success() {
            error!("Facebook API error: {} - {}", status, result);
            return Err(FacebookError::UpstreamRejected {
                context: "Failed to send message".to_string(),
                status: status.as_u16(),
                body: result.to_string(),
            });
        }

        info!(
            "Message sent successfully: {:?}",
            result.get("message_id").and_then(|v| v.as_str())
        );
        Ok(result)
    }

    /// Subscribe a page to this app's webhook
    pub async fn subscribe_page(&self, page_id: &str, page_access_token: &str) -> Result<JsonValue> {
        let url = format!("{}/{}/subscribed_apps", self.base_url, page_id);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("subscribed_fields", SUBSCRIBED_FIELDS),
                ("access_token", page_access_token),
            ])
            .send()
            .await?;

        let result = Self::json_or_reject(response, "Failed to subscribe page").await?;
        info!("Page {} subscribed to webhook", page_id);
        Ok(result)
    }

    /// Decode a JSON body, or fail with the raw body on a non-success status
    async fn json_or_reject(response: Response, context: &str) -> Result<JsonValue> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Facebook API error: {} - {}", status, body);
            return Err(FacebookError::UpstreamRejected {
                context: context.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

// =============================================================================
// Data structures for the Graph API
// =============================================================================

#[derive(Debug, Serialize)]
struct SendMessagePayload {
    recipient: Recipient,
    message: MessageText,
    messaging_type: String,
}

#[derive(Debug, Serialize)]
struct Recipient {
    id: String,
}

#[derive(Debug, Serialize)]
struct MessageText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    data: Vec<PageAccount>,
    error: Option<JsonValue>,
}

/// Entry of `/me/accounts`
#[derive(Debug, Deserialize)]
struct PageAccount {
    id: String,
    access_token: Option<String>,
}
