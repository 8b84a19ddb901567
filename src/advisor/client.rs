//! HTTP client for the stargazing backend
//!
//! Requests are never retried; failures surface as a single user-facing
//! message taken from the backend's `{detail: {message}}` body when present.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::models::{DailyForecast, DarkSkyZone, Location, LocationPayload, StargazingRecommendation};
use crate::{Result, StargazerError};

/// Shown when the backend cannot be reached or its reply is unreadable
pub const GENERIC_FAILURE: &str =
    "Unable to reach the stargazing service. Please check your connection and try again.";

/// Retry hint used when a 429 carries no `retry_after`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Backend operations the advisor session depends on
#[async_trait]
pub trait AdvisorBackend: Send + Sync {
    async fn find_dark_sky_zones(&self, location: &Location, limit: usize) -> Result<Vec<DarkSkyZone>>;

    async fn stargazing_recommendations(
        &self,
        location: &Location,
        days: u32,
        zone_name: Option<&str>,
    ) -> Result<Vec<StargazingRecommendation>>;
}

#[derive(Deserialize)]
struct ZonesResponse {
    dark_sky_zones: Vec<DarkSkyZone>,
}

#[derive(Deserialize)]
struct RecommendationsResponse {
    recommendations: Vec<StargazingRecommendation>,
}

#[derive(Deserialize)]
struct ForecastsResponse {
    forecasts: Vec<DailyForecast>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured {
        message: Option<String>,
        retry_after: Option<u64>,
    },
    Text(String),
}

/// Map a non-success reply to a [`StargazerError`]
fn error_from_body(status: StatusCode, body: &str) -> StargazerError {
    let detail = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.detail);

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = match detail {
            Some(ErrorDetail::Structured { retry_after, .. }) => retry_after,
            _ => None,
        };
        return StargazerError::RateLimited {
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        };
    }

    let message = match detail {
        Some(ErrorDetail::Structured {
            message: Some(message),
            ..
        })
        | Some(ErrorDetail::Text(message)) => message,
        _ => format!(
            "Request failed: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        ),
    };

    match status {
        StatusCode::NOT_FOUND => StargazerError::not_found(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => StargazerError::validation(message),
        _ => StargazerError::api(message),
    }
}

pub struct AdvisorClient {
    client: Client,
    base_url: String,
}

impl AdvisorClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("stargazer/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                warn!("Unreadable backend response: {e}");
                StargazerError::api(GENERIC_FAILURE)
            });
        }

        let body = response.text().await.unwrap_or_default();
        debug!("Backend replied {status}: {body}");
        Err(error_from_body(status, &body))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            warn!("Backend request failed: {e}");
            StargazerError::api(GENERIC_FAILURE)
        })
    }

    /// Nightly weather for a coordinate pair
    #[instrument(skip(self))]
    pub async fn weather_forecast(&self, latitude: f64, longitude: f64, days: u32) -> Result<Vec<DailyForecast>> {
        let url = format!("{}/weather-forecast/{latitude}/{longitude}", self.base_url);
        let response = self
            .send(self.client.get(url).query(&[("days", days)]))
            .await?;
        Ok(Self::read::<ForecastsResponse>(response).await?.forecasts)
    }
}

#[async_trait]
impl AdvisorBackend for AdvisorClient {
    #[instrument(skip(self, location), fields(location = %location.format_coordinates()))]
    async fn find_dark_sky_zones(&self, location: &Location, limit: usize) -> Result<Vec<DarkSkyZone>> {
        let url = format!("{}/find-dark-sky-zones", self.base_url);
        let request = self
            .client
            .post(url)
            .query(&[("limit", limit)])
            .json(&LocationPayload::from(location));
        let response = self.send(request).await?;
        Ok(Self::read::<ZonesResponse>(response).await?.dark_sky_zones)
    }

    #[instrument(skip(self, location), fields(location = %location.format_coordinates()))]
    async fn stargazing_recommendations(
        &self,
        location: &Location,
        days: u32,
        zone_name: Option<&str>,
    ) -> Result<Vec<StargazingRecommendation>> {
        let url = format!("{}/stargazing-recommendations", self.base_url);
        let mut request = self
            .client
            .post(url)
            .query(&[("days", days)])
            .json(&LocationPayload::from(location));
        if let Some(zone) = zone_name {
            request = request.query(&[("zone_name", zone)]);
        }
        let response = self.send(request).await?;
        Ok(Self::read::<RecommendationsResponse>(response).await?.recommendations)
    }
}
