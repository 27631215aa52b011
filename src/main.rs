#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use social_service::infrastructure::{config::AppConfig, http::start_server};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::load().inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    info!(mode = %config.mode, port = config.server.port, "Starting Social Service");

    if let Err(e) = start_server(config).await {
        error!(error = ?e, "Server error");
        return Err(e);
    }

    Ok(())
}

/// Initialize structured logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
