use anyhow::{Context, Result};
use tracing::{info, warn};

use stargazer::{StargazerConfig, cache, telemetry, web};

#[tokio::main]
async fn main() -> Result<()> {
    let config = StargazerConfig::load().with_context(|| "Failed to load configuration")?;
    telemetry::init_tracing(&config.logging)?;
    info!("Starting Stargazer {}", stargazer::VERSION);

    if config.cache.enabled {
        match cache::init(&config.cache.location) {
            Ok(()) => info!("Response cache at {}", config.cache.location),
            Err(e) => warn!("Running without response cache: {e:#}"),
        }
    }

    web::run(config).await
}
