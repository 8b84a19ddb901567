use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, AppState};
use crate::config::StargazerConfig;
use crate::weather::OpenMeteoClient;
use crate::zones::ZoneCatalog;

/// Request bodies are a single location
const MAX_BODY_BYTES: usize = 16 * 1024;

pub async fn run(config: StargazerConfig) -> Result<()> {
    let catalog = ZoneCatalog::embedded()?;
    info!("Loaded {} dark sky zones", catalog.len());

    let weather = Arc::new(OpenMeteoClient::new(&config.weather)?);
    let state = AppState::new(
        catalog,
        weather,
        config.search.clone(),
        config.server.requests_per_minute,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_seconds,
        )))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        }))
        .layer(cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Stargazer API running at http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
