//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. messenger-bridge.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "messenger-bridge.toml";

/// Facebook app / Graph API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    /// Facebook app id
    #[serde(default)]
    pub app_id: String,

    /// Facebook app secret
    #[serde(default, skip_serializing)]
    pub app_secret: String,

    /// OAuth redirect URI registered for the app
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Shared secret for the webhook verification handshake
    #[serde(default, skip_serializing)]
    pub verify_token: String,

    /// Graph API base URL (without version)
    #[serde(default = "default_graph_api_url")]
    pub graph_api_url: String,

    /// Graph API version, e.g. `v18.0`
    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,

    /// Permission scopes requested by the OAuth dialog
    #[serde(default = "default_oauth_scopes")]
    pub oauth_scopes: Vec<String>,

    /// Timeout for the outbound send call, in seconds
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            verify_token: String::new(),
            graph_api_url: default_graph_api_url(),
            graph_api_version: default_graph_api_version(),
            oauth_scopes: default_oauth_scopes(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl FacebookConfig {
    /// Versioned Graph API base, e.g. `https://graph.facebook.com/v18.0`
    pub fn graph_base_url(&self) -> String {
        format!(
            "{}/{}",
            self.graph_api_url.trim_end_matches('/'),
            self.graph_api_version
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Allowed CORS origins
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Where the browser is sent after a completed login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    #[serde(default = "default_frontend_url")]
    pub url: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            url: default_frontend_url(),
        }
    }
}

/// Keyword auto-reply for inbound messages.
///
/// Disabled unless a page access token is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReplyConfig {
    #[serde(default, skip_serializing)]
    pub page_access_token: Option<String>,

    #[serde(default = "default_auto_reply_keyword")]
    pub keyword: String,

    #[serde(default = "default_auto_reply_text")]
    pub reply_text: String,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            page_access_token: None,
            keyword: default_auto_reply_keyword(),
            reply_text: default_auto_reply_text(),
        }
    }
}

impl AutoReplyConfig {
    pub fn is_enabled(&self) -> bool {
        self.page_access_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

/// Main configuration for messenger-bridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub facebook: FacebookConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub frontend: FrontendConfig,

    #[serde(default)]
    pub auto_reply: AutoReplyConfig,
}

fn default_redirect_uri() -> String {
    "http://localhost:8000/auth/facebook/callback".to_string()
}

fn default_graph_api_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v18.0".to_string()
}

fn default_oauth_scopes() -> Vec<String> {
    [
        "instagram_basic",
        "instagram_manage_messages",
        "pages_read_engagement",
        "pages_show_list",
        "business_management",
        "pages_messaging",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_api_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "https://localhost:5173".to_string(),
    ]
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_auto_reply_keyword() -> String {
    "hello".to_string()
}

fn default_auto_reply_text() -> String {
    "Hello! How can I help you?".to_string()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後で環境変数による上書きが適用されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded_content = Self::expand_env_vars(&toml_content);

        let mut cfg: Config = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        cfg.apply_env_overrides();
        cfg.validate()?;

        Ok(cfg)
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// `./messenger-bridge.toml` があればそれを使い、
    /// 見つからない場合は環境変数のみから読み込みます。
    pub fn load() -> crate::Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Config::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        // Facebook
        if let Some(app_id) = var("FB_APP_ID") {
            self.facebook.app_id = app_id;
        }
        if let Some(secret) = var("FB_APP_SECRET") {
            self.facebook.app_secret = secret;
        }
        if let Some(uri) = var("FB_REDIRECT_URI") {
            self.facebook.redirect_uri = uri;
        }
        if let Some(token) = var("WEBHOOK_VERIFY_TOKEN") {
            self.facebook.verify_token = token;
        }
        if let Some(url) = var("FB_GRAPH_API_URL") {
            self.facebook.graph_api_url = url;
        }
        if let Some(version) = var("FB_GRAPH_API_VERSION") {
            self.facebook.graph_api_version = version;
        }
        if let Some(scopes) = var("FB_OAUTH_SCOPES") {
            self.facebook.oauth_scopes = split_list(&scopes);
        }
        if let Some(Ok(secs)) = var("FB_SEND_TIMEOUT_SECS").map(|v| v.parse::<u64>()) {
            self.facebook.send_timeout_secs = secs;
        }

        // HTTP API
        if let Some(Ok(port)) = var("API_PORT").map(|v| v.parse::<u16>()) {
            self.api.port = port;
        }
        if let Some(origins) = var("API_ALLOWED_ORIGINS") {
            self.api.allowed_origins = split_list(&origins);
        }

        // Frontend
        if let Some(url) = var("FRONTEND_URL") {
            self.frontend.url = url;
        }

        // Auto-reply
        if let Some(token) = var("AUTO_REPLY_PAGE_TOKEN") {
            self.auto_reply.page_access_token = Some(token);
        }
        if let Some(keyword) = var("AUTO_REPLY_KEYWORD") {
            self.auto_reply.keyword = keyword;
        }
        if let Some(text) = var("AUTO_REPLY_TEXT") {
            self.auto_reply.reply_text = text;
        }
    }

    /// Check that every externally supplied secret is present
    pub fn validate(&self) -> crate::Result<()> {
        let required = [
            ("FB_APP_ID", &self.facebook.app_id),
            ("FB_APP_SECRET", &self.facebook.app_secret),
            ("WEBHOOK_VERIFY_TOKEN", &self.facebook.verify_token),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!("{} not set", missing.join(", "))));
        }

        if self.facebook.send_timeout_secs == 0 {
            return Err(Error::Config(
                "send_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn configured() -> Config {
        let mut config = Config::default();
        config.facebook.app_id = "app".to_string();
        config.facebook.app_secret = "secret".to_string();
        config.facebook.verify_token = "verify".to_string();
        config
    }

    #[test]
    fn test_facebook_config_default() {
        let config = FacebookConfig::default();
        assert_eq!(config.graph_api_version, "v18.0");
        assert_eq!(config.send_timeout_secs, 30);
        assert_eq!(config.oauth_scopes.len(), 6);
        assert!(config.oauth_scopes.contains(&"pages_messaging".to_string()));
        assert!(config.app_id.is_empty());
    }

    #[test]
    fn test_graph_base_url() {
        let mut config = FacebookConfig::default();
        assert_eq!(config.graph_base_url(), "https://graph.facebook.com/v18.0");

        config.graph_api_url = "http://127.0.0.1:9000/".to_string();
        config.graph_api_version = "v19.0".to_string();
        assert_eq!(config.graph_base_url(), "http://127.0.0.1:9000/v19.0");
    }

    #[test]
    fn test_api_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_auto_reply_disabled_by_default() {
        let config = AutoReplyConfig::default();
        assert!(!config.is_enabled());

        let config = AutoReplyConfig {
            page_access_token: Some(String::new()),
            ..Default::default()
        };
        assert!(!config.is_enabled());

        let config = AutoReplyConfig {
            page_access_token: Some("page-token".to_string()),
            ..Default::default()
        };
        assert!(config.is_enabled());
    }

    #[test]
    fn test_validate_reports_missing_secrets() {
        let err = Config::default().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("FB_APP_ID"));
        assert!(msg.contains("FB_APP_SECRET"));
        assert!(msg.contains("WEBHOOK_VERIFY_TOKEN"));

        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = configured();
        config.facebook.send_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // テスト用環境変数を設定
        unsafe {
            std::env::set_var("MB_CONFIG_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${MB_CONFIG_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        // 存在しない環境変数
        let result = Config::expand_env_vars("prefix_${MB_CONFIG_NONEXISTENT}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("MB_CONFIG_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_passthrough() {
        assert_eq!(Config::expand_env_vars("no_vars_here"), "no_vars_here");
        assert_eq!(Config::expand_env_vars("cost: $5"), "cost: $5");
        assert_eq!(Config::expand_env_vars("${}_content"), "_content");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[facebook]
app_id = "123"
app_secret = "shh"
verify_token = "verify"
graph_api_version = "v19.0"
send_timeout_secs = 10

[api]
port = 9090
allowed_origins = ["https://app.example.com"]

[frontend]
url = "https://app.example.com"

[auto_reply]
page_access_token = "page-token"
keyword = "price"
reply_text = "See our catalog"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.facebook.app_id, "123");
        assert_eq!(config.facebook.graph_api_version, "v19.0");
        assert_eq!(config.facebook.graph_api_url, "https://graph.facebook.com");
        assert_eq!(config.facebook.send_timeout_secs, 10);
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.api.allowed_origins, vec!["https://app.example.com"]);
        assert_eq!(config.frontend.url, "https://app.example.com");
        assert!(config.auto_reply.is_enabled());
        assert_eq!(config.auto_reply.keyword, "price");
    }

    #[test]
    fn test_from_toml_file_expands_env() {
        unsafe {
            std::env::set_var("MB_CONFIG_TEST_SECRET", "from-env");
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[facebook]
app_id = "123"
app_secret = "${{MB_CONFIG_TEST_SECRET}}"
verify_token = "verify"
"#
        )
        .unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        // FB_APP_SECRET が設定されている環境ではそちらが優先される
        if std::env::var("FB_APP_SECRET").is_err() {
            assert_eq!(config.facebook.app_secret, "from-env");
        }

        unsafe {
            std::env::remove_var("MB_CONFIG_TEST_SECRET");
        }
    }

    #[test]
    fn test_from_toml_file_missing() {
        let err = Config::from_toml_file("/nonexistent/messenger-bridge.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
