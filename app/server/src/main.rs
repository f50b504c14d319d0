use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use seedsweep::api::{self, AppState};
use seedsweep::config::Config;
use seedsweep::credentials::ProviderKeys;
use seedsweep::service::HttpDeriveService;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Seedsweep server starting...");

    let config = Config::from_env().context("Invalid configuration")?;
    info!("Derivation service: {}", config.service_url);
    info!("Export directory: {}", config.export_dir.display());

    let credentials = match &config.credentials_file {
        Some(path) => {
            let (keys, _) = ProviderKeys::load_file(path, &config.providers)
                .context("Failed to preload provider credentials")?;
            keys
        }
        None => ProviderKeys::new(),
    };

    let service = HttpDeriveService::from_config(&config)
        .context("Failed to init derivation service client")?;

    let bind = config.bind;
    let state = Arc::new(AppState::new(config, Arc::new(service), credentials));
    let app = api::router(state);

    let listener = TcpListener::bind(bind)
        .await
        .context("Failed to bind")?;

    info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}
