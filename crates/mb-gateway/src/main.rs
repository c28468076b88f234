//! messenger-bridge: Facebook Messenger bridge server
//!
//! Usage:
//!   messenger-bridge           - Start the HTTP server
//!   messenger-bridge --help    - Show help

use mb_core::Config;
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    Server,
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args() {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("messenger-bridge {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting messenger-bridge...");
    tracing::info!(
        "Graph API: {}, frontend: {}",
        config.facebook.graph_base_url(),
        config.frontend.url
    );

    run_server(config).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

fn print_help() {
    println!("messenger-bridge - Facebook Messenger bridge");
    println!();
    println!("Usage:");
    println!("  messenger-bridge           Start the HTTP server");
    println!("  messenger-bridge --help    Show this help message");
    println!("  messenger-bridge --version Show version");
    println!();
    println!("Configuration is read from ./messenger-bridge.toml when present,");
    println!("environment variables override file values.");
    println!();
    println!("Environment Variables:");
    println!("  FB_APP_ID              Facebook app id (required)");
    println!("  FB_APP_SECRET          Facebook app secret (required)");
    println!("  WEBHOOK_VERIFY_TOKEN   Webhook handshake token (required)");
    println!("  FB_REDIRECT_URI        OAuth redirect URI");
    println!("  FB_GRAPH_API_URL       Graph API host (default: https://graph.facebook.com)");
    println!("  FB_GRAPH_API_VERSION   Graph API version (default: v18.0)");
    println!("  FB_OAUTH_SCOPES        Comma separated OAuth scopes");
    println!("  FB_SEND_TIMEOUT_SECS   Send API timeout in seconds (default: 30)");
    println!("  API_PORT               HTTP port (default: 8000)");
    println!("  API_ALLOWED_ORIGINS    Comma separated CORS origins");
    println!("  FRONTEND_URL           Redirect target after login");
    println!("  AUTO_REPLY_PAGE_TOKEN  Page token enabling keyword auto-reply");
    println!("  AUTO_REPLY_KEYWORD     Keyword that triggers the auto-reply");
    println!("  AUTO_REPLY_TEXT        Auto-reply message text");
    println!("  RUST_LOG               Log filter (default: info)");
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Press Ctrl+C to exit");
    serve_until(mb_api::start_server(config), tokio::signal::ctrl_c()).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Run the server until `shutdown` resolves. A server that stops on its own
/// (e.g. the port is taken) is an error.
async fn serve_until<F, S>(server: F, shutdown: S) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
    S: Future<Output = std::io::Result<()>>,
{
    let server = tokio::spawn(server);

    tokio::select! {
        result = server => {
            result??;
            anyhow::bail!("HTTP API stopped unexpectedly");
        }
        signal = shutdown => {
            signal?;
            tracing::info!("Shutting down...");
            Ok(())
        }
    }
}
