//! Weather forecasts for stargazing
//!
//! Fetches hourly forecasts from `OpenMeteo`, condenses each night into a
//! [`WeatherConditions`] summary and scores it for stargazing.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rand::RngExt;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tracing::{debug, info, instrument, warn};

use crate::cache;
use crate::config::WeatherConfig;
use crate::models::{DailyForecast, Location, WeatherConditions};

pub mod open_meteo;

/// Source of nightly weather forecasts
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Forecast for the next `days` nights starting tonight
    async fn nightly_forecast(&self, location: &Location, days: u32) -> Result<Vec<DailyForecast>>;
}

/// Stargazing quality of the weather, 0-100.
///
/// Clouds dominate, followed by precipitation risk; humidity above 70%,
/// wind above 10 mph and haze below 10 miles visibility cost extra.
#[must_use]
pub fn weather_score(conditions: &WeatherConditions) -> f64 {
    let mut score = 100.0;
    score -= conditions.cloud_cover.clamp(0.0, 100.0) * 0.5;
    score -= conditions.precipitation_chance.clamp(0.0, 100.0) * 0.3;
    if conditions.humidity > 70.0 {
        score -= (conditions.humidity - 70.0) * 0.3;
    }
    if conditions.wind_speed_mph > 10.0 {
        score -= (conditions.wind_speed_mph - 10.0) * 1.5;
    }
    if conditions.visibility_miles < 10.0 {
        score -= (10.0 - conditions.visibility_miles.max(0.0)) * 2.0;
    }
    score.clamp(0.0, 100.0).round()
}

/// `OpenMeteo` forecast client with retries and a persistent cache
pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    base_url: String,
    cache_ttl: Duration,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("stargazer/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache_ttl: Duration::from_secs(u64::from(config.cache_ttl_hours) * 3600),
        })
    }

    fn forecast_url(&self, location: &Location, days: u32) -> String {
        // One extra day so the last night's early-morning hours are included
        format!(
            "{}/forecast?latitude={}&longitude={}&hourly={}&temperature_unit=fahrenheit&wind_speed_unit=mph&timezone=auto&forecast_days={}",
            self.base_url,
            location.latitude(),
            location.longitude(),
            open_meteo::HOURLY_VARIABLES,
            days + 1
        )
    }

    async fn fetch(&self, location: &Location, days: u32) -> Result<Vec<DailyForecast>> {
        let url = self.forecast_url(location, days);
        debug!("OpenMeteo API request URL: {}", url);

        let start_time = Instant::now();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| "Failed to reach OpenMeteo")?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<open_meteo::ErrorResponse>()
                .await
                .map(|e| e.reason)
                .unwrap_or_else(|_| status.to_string());
            return Err(anyhow!("OpenMeteo request failed ({status}): {reason}"));
        }

        let forecast: open_meteo::ForecastResponse = response
            .json()
            .await
            .with_context(|| "Failed to parse OpenMeteo forecast response")?;
        let nights = forecast.into_nightly_forecasts(days as usize);

        let elapsed = start_time.elapsed();
        info!(
            "Retrieved {} nights of weather in {:.3}s",
            nights.len(),
            elapsed.as_secs_f64()
        );
        if elapsed.as_secs() > 5 {
            warn!("Slow forecast API response: {:.3}s", elapsed.as_secs_f64());
        }

        Ok(nights)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    #[instrument(skip(self, location), fields(location = %location.format_coordinates()))]
    async fn nightly_forecast(&self, location: &Location, days: u32) -> Result<Vec<DailyForecast>> {
        let key = location.forecast_cache_key(days);

        match cache::get::<Vec<DailyForecast>>(&key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable forecast cache entry: {e:#}"),
        }

        let nights = self.fetch(location, days).await?;

        let jitter: f32 = rand::rng().random_range(0.9..1.1);
        let ttl = self.cache_ttl.mul_f32(jitter);
        if let Err(e) = cache::put(&key, nights.clone(), ttl).await {
            warn!("Failed to cache forecast: {e:#}");
        }

        Ok(nights)
    }
}
