//! REST API for dark-sky zones, recommendations and weather
//!
//! Every error leaves as `{"detail": {"message": ...}}`; rate-limited
//! requests additionally carry `retry_after` in seconds.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{
        Path, Query, Request, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, instrument, warn};

use crate::config::SearchConfig;
use crate::models::{Location, LocationPayload};
use crate::recommendations::RecommendationService;
use crate::weather::WeatherSource;
use crate::zones::ZoneCatalog;
use crate::{StargazerError, VERSION};

/// Days of weather returned by the forecast endpoint when not specified
const DEFAULT_FORECAST_DAYS: u32 = 7;

/// Sliding one-minute window limiter shared by all API requests
#[derive(Debug)]
pub struct RateLimiter {
    max_requests_per_minute: u32,
    request_times: Vec<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self {
            max_requests_per_minute,
            request_times: Vec::new(),
        }
    }

    /// Record a request, or return how long until one would be allowed
    pub fn check(&mut self) -> Result<(), Duration> {
        self.cleanup_old_requests();

        if self.request_times.len() < self.max_requests_per_minute as usize {
            self.request_times.push(Instant::now());
            return Ok(());
        }

        let wait = self
            .request_times
            .first()
            .map_or(Duration::ZERO, |oldest| {
                Duration::from_secs(60).saturating_sub(oldest.elapsed())
            });
        Err(wait)
    }

    fn cleanup_old_requests(&mut self) {
        self.request_times
            .retain(|time| time.elapsed() < Duration::from_secs(60));
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ZoneCatalog>,
    pub weather: Arc<dyn WeatherSource>,
    pub recommendations: Arc<RecommendationService>,
    pub limiter: Arc<Mutex<RateLimiter>>,
    pub search: SearchConfig,
}

impl AppState {
    pub fn new(
        catalog: ZoneCatalog,
        weather: Arc<dyn WeatherSource>,
        search: SearchConfig,
        requests_per_minute: u32,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let recommendations = Arc::new(RecommendationService::new(
            Arc::clone(&catalog),
            Arc::clone(&weather),
            search.max_days,
        ));
        Self {
            catalog,
            weather,
            recommendations,
            limiter: Arc::new(Mutex::new(RateLimiter::new(requests_per_minute))),
            search,
        }
    }
}

impl IntoResponse for StargazerError {
    fn into_response(self) -> Response {
        let status = match &self {
            StargazerError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            StargazerError::NotFound { .. } => StatusCode::NOT_FOUND,
            StargazerError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            StargazerError::Api { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {self}");
        } else {
            debug!("Request rejected ({status}): {self}");
        }

        let body = match &self {
            StargazerError::RateLimited { retry_after } => json!({
                "detail": { "message": self.user_message(), "retry_after": retry_after }
            }),
            _ => json!({ "detail": { "message": self.user_message() } }),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, StargazerError>;

fn location_from_body(body: Result<Json<LocationPayload>, JsonRejection>) -> ApiResult<Location> {
    let Json(payload) = body.map_err(|e| StargazerError::validation(e.body_text()))?;
    Location::try_from(payload)
}

fn check_days(days: u32, max_days: u32) -> ApiResult<u32> {
    if (1..=max_days).contains(&days) {
        Ok(days)
    } else {
        Err(StargazerError::validation(format!(
            "days must be between 1 and {max_days}, got: {days}"
        )))
    }
}

#[derive(Debug, Deserialize)]
pub struct ZoneQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub days: Option<u32>,
    pub zone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub days: Option<u32>,
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Dark Sky Zone Finder API", "version": VERSION }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

#[instrument(skip_all)]
async fn find_dark_sky_zones(
    State(state): State<AppState>,
    query: Result<Query<ZoneQuery>, QueryRejection>,
    body: Result<Json<LocationPayload>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Query(query) = query.map_err(|e| StargazerError::validation(e.body_text()))?;
    let location = location_from_body(body)?;

    let limit = query
        .limit
        .unwrap_or(state.search.default_zone_limit)
        .clamp(1, state.catalog.len().max(1));
    let zones = state.catalog.find_nearest(&location, limit);
    debug!("Returning {} zones near {}", zones.len(), location.format_coordinates());

    Ok(Json(json!({ "dark_sky_zones": zones })))
}

#[instrument(skip_all)]
async fn stargazing_recommendations(
    State(state): State<AppState>,
    query: Result<Query<RecommendationQuery>, QueryRejection>,
    body: Result<Json<LocationPayload>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Query(query) = query.map_err(|e| StargazerError::validation(e.body_text()))?;
    let location = location_from_body(body)?;
    let days = check_days(
        query.days.unwrap_or(state.search.default_days),
        state.search.max_days,
    )?;
    let zone_name = query.zone_name.as_deref().map(str::trim).filter(|z| !z.is_empty());

    let recommendations = state
        .recommendations
        .recommend(&location, days, zone_name)
        .await?;
    Ok(Json(json!({ "recommendations": recommendations })))
}

#[instrument(skip_all)]
async fn weather_forecast(
    State(state): State<AppState>,
    path: Result<Path<(f64, f64)>, PathRejection>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Path((lat, lng)) = path.map_err(|e| StargazerError::validation(e.body_text()))?;
    let Query(query) = query.map_err(|e| StargazerError::validation(e.body_text()))?;
    let location = Location::new(lat, lng, None)?;
    let days = check_days(
        query.days.unwrap_or(DEFAULT_FORECAST_DAYS),
        state.search.max_days,
    )?;

    let forecasts = state
        .weather
        .nightly_forecast(&location, days)
        .await
        .map_err(|e| {
            warn!("Weather forecast failed: {e:#}");
            StargazerError::api("Weather data is currently unavailable. Please try again later.")
        })?;
    Ok(Json(json!({ "forecasts": forecasts })))
}

/// Record a request against the shared limiter; a poisoned lock keeps limiting
fn admit(limiter: &Mutex<RateLimiter>) -> Result<(), Duration> {
    limiter.lock().unwrap_or_else(PoisonError::into_inner).check()
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match admit(&state.limiter) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            warn!("Rate limit exceeded, retry in {:.1}s", wait.as_secs_f64());
            StargazerError::RateLimited {
                retry_after: wait.as_secs().max(1),
            }
            .into_response()
        }
    }
}

/// Routes with state applied; layers are added by the server
pub fn create_router(state: AppState) -> Router {
    let limited = Router::new()
        .route("/find-dark-sky-zones", post(find_dark_sky_zones))
        .route("/stargazing-recommendations", post(stargazing_recommendations))
        .route("/weather-forecast/{lat}/{lng}", get(weather_forecast))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(limited)
        .with_state(state)
}
