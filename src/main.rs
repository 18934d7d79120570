use anyhow::{Context, Result};
use realty_auth::api::{create_router, AppState};
use realty_auth::config::{load_config, AppConfig, Secrets};
use realty_auth::credentials::CookieTokenStore;
use realty_auth::gate::AuthGate;
use realty_auth::gmail::MailboxClient;
use realty_auth::oauth::OAuthClient;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "realty_auth=info".into()),
        )
        .init();

    info!("Realty auth service starting...");

    let config = match std::env::var("REALTY_AUTH_CONFIG") {
        Ok(path) => load_config(&path).with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => AppConfig::default(),
    };

    let secrets = Secrets::from_env().context("Failed to read Google OAuth settings from environment")?;
    let secure_cookies = secrets.production || config.server.production;

    info!(
        bind_address = %config.server.bind_address,
        redirect_uri = %secrets.redirect_uri,
        secure_cookies = secure_cookies,
        dedupe_refresh = config.oauth.dedupe_refresh,
        "Configuration loaded"
    );
    if secrets.mock_mode {
        warn!("Mock Google authentication enabled");
    }

    let store = Arc::new(CookieTokenStore::new(secrets.cipher.clone(), secure_cookies));

    let oauth = Arc::new(
        OAuthClient::from_config(&config.oauth, &secrets, store)
            .context("Failed to initialize OAuth client")?,
    );
    let gate = Arc::new(AuthGate::new(Arc::clone(&oauth)).context("Failed to initialize API client")?);
    let mailbox = Arc::new(MailboxClient::new(config.gmail.api_base.clone()));

    let state = AppState {
        oauth,
        gate,
        mailbox,
        session: config.session.clone(),
        callback_timeout: config.oauth.callback_timeout(),
        default_max_results: config.gmail.default_max_results,
        mock_mailbox: secrets.mock_mode,
    };
    let router = create_router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .context("Failed to bind HTTP address")?;
    info!(address = %config.server.bind_address, "HTTP API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Realty auth service stopped");

    Ok(())
}
