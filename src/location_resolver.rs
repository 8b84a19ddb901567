//! Location Resolution Module
//!
//! Turns the three ways a user can give a location into a validated
//! [`Location`]:
//!
//! - manual latitude/longitude entry, validated locally
//! - a US zipcode, format-checked and then geocoded through Nominatim
//! - the device position, with a mobile-aware timeout and a short-lived cache

use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngExt;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::cache;
use crate::config::GeocodingConfig;
use crate::models::Location;
use crate::{Result, StargazerError};

static ZIPCODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());

static MOBILE_USER_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)android|webos|iphone|ipad|ipod|blackberry|iemobile|opera mini|mobile").unwrap()
});

/// Position cache window for device geolocation
pub const POSITION_MAX_AGE: Duration = Duration::from_secs(5 * 60);
pub const MOBILE_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DESKTOP_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(15);

const GEOCODE_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Types of location input
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Coordinates (latitude, longitude)
    Coordinates(f64, f64),
    /// US zipcode, 5 or 5+4 digits
    Zipcode(String),
}

/// Location parsing utilities
pub struct LocationParser;

impl LocationParser {
    /// Parse free text as either "lat, lon" or a zipcode
    pub fn parse(input: &str) -> Result<LocationInput> {
        let input = input.trim();

        if ZIPCODE_PATTERN.is_match(input) {
            return Ok(LocationInput::Zipcode(input.to_string()));
        }

        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        if let [lat, lon] = parts[..] {
            let location = Self::parse_coordinates(lat, lon)?;
            return Ok(LocationInput::Coordinates(location.latitude(), location.longitude()));
        }

        Err(StargazerError::validation(
            "Enter coordinates as 'latitude, longitude' or a 5-digit zipcode",
        ))
    }

    /// Parse and range-check manually entered latitude and longitude
    pub fn parse_coordinates(latitude: &str, longitude: &str) -> Result<Location> {
        let lat = latitude
            .trim()
            .parse::<f64>()
            .map_err(|_| StargazerError::validation(format!("Invalid latitude: {}", latitude.trim())))?;
        let lon = longitude
            .trim()
            .parse::<f64>()
            .map_err(|_| StargazerError::validation(format!("Invalid longitude: {}", longitude.trim())))?;

        Location::new(lat, lon, None)
    }

    /// Check a zipcode's format before any geocoding request is made
    pub fn validate_zipcode(zipcode: &str) -> Result<&str> {
        let zipcode = zipcode.trim();
        if ZIPCODE_PATTERN.is_match(zipcode) {
            Ok(zipcode)
        } else {
            Err(StargazerError::validation(
                "Please enter a valid 5-digit zipcode (e.g. 94103 or 94103-1234)",
            ))
        }
    }
}

/// A geocoded place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResult {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeocodingResult {
    pub fn into_location(self) -> Result<Location> {
        Location::new(self.latitude, self.longitude, Some(self.name))
    }
}

/// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

impl TryFrom<NominatimPlace> for GeocodingResult {
    type Error = anyhow::Error;

    fn try_from(place: NominatimPlace) -> anyhow::Result<Self> {
        Ok(Self {
            latitude: place.lat.parse().with_context(|| format!("Bad latitude '{}'", place.lat))?,
            longitude: place.lon.parse().with_context(|| format!("Bad longitude '{}'", place.lon))?,
            name: place.display_name,
        })
    }
}

/// Forward and reverse geocoding
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search_zipcode(&self, zipcode: &str) -> anyhow::Result<Option<GeocodingResult>>;

    async fn reverse(&self, latitude: f64, longitude: f64) -> anyhow::Result<Option<GeocodingResult>>;
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    country_codes: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(config.user_agent.clone())
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            country_codes: config.country_codes.clone(),
        })
    }

    fn search_url(&self, zipcode: &str) -> String {
        format!(
            "{}/search?postalcode={}&countrycodes={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(zipcode),
            urlencoding::encode(&self.country_codes)
        )
    }

    fn reverse_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}/reverse?lat={latitude}&lon={longitude}&format=json",
            self.base_url
        )
    }

    async fn get_json(&self, url: &str) -> anyhow::Result<serde_json::Value> {
        debug!("Nominatim request URL: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| "Failed to reach Nominatim")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Nominatim request failed: {status}"));
        }
        response
            .json()
            .await
            .with_context(|| "Failed to parse Nominatim response")
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn search_zipcode(&self, zipcode: &str) -> anyhow::Result<Option<GeocodingResult>> {
        let key = format!("geocode:zip:{}:{zipcode}", self.country_codes);
        if let Ok(Some(hit)) = cache::get::<GeocodingResult>(&key).await {
            return Ok(Some(hit));
        }

        let value = self.get_json(&self.search_url(zipcode)).await?;
        let places: Vec<NominatimPlace> =
            serde_json::from_value(value).with_context(|| "Unexpected Nominatim search payload")?;
        let Some(place) = places.into_iter().next() else {
            info!("No geocoding result for zipcode {}", zipcode);
            return Ok(None);
        };
        let result = GeocodingResult::try_from(place)?;

        let jitter: f32 = rand::rng().random_range(0.9..1.1);
        if let Err(e) = cache::put(&key, result.clone(), GEOCODE_CACHE_TTL.mul_f32(jitter)).await {
            warn!("Failed to cache geocoding result: {e:#}");
        }
        Ok(Some(result))
    }

    #[instrument(skip(self))]
    async fn reverse(&self, latitude: f64, longitude: f64) -> anyhow::Result<Option<GeocodingResult>> {
        let value = self.get_json(&self.reverse_url(latitude, longitude)).await?;
        // Misses come back as {"error": "Unable to geocode"}
        if value.get("error").is_some() {
            return Ok(None);
        }
        let place: NominatimPlace =
            serde_json::from_value(value).with_context(|| "Unexpected Nominatim reverse payload")?;
        Ok(Some(GeocodingResult::try_from(place)?))
    }
}

/// Service for resolving manual and zipcode input
pub struct LocationResolver<G> {
    geocoder: G,
}

impl<G: Geocoder> LocationResolver<G> {
    pub fn new(geocoder: G) -> Self {
        Self { geocoder }
    }

    /// Resolve a parsed input into a structured Location
    pub async fn resolve(&self, input: LocationInput) -> Result<Location> {
        debug!("Resolving location input: {:?}", input);
        match input {
            LocationInput::Coordinates(lat, lon) => {
                let location = Location::new(lat, lon, None)?;
                Ok(self.with_place_name(location).await)
            }
            LocationInput::Zipcode(zipcode) => self.resolve_zipcode(&zipcode).await,
        }
    }

    /// Geocode a zipcode; malformed codes never reach the geocoder
    pub async fn resolve_zipcode(&self, zipcode: &str) -> Result<Location> {
        let zipcode = LocationParser::validate_zipcode(zipcode)?;
        let not_found = || {
            StargazerError::not_found(format!(
                "Could not find a location for zipcode {zipcode}. Please try again or enter coordinates manually."
            ))
        };

        match self.geocoder.search_zipcode(zipcode).await {
            Ok(Some(result)) => {
                debug!(
                    "Found location for zipcode {}: {} ({:.4}, {:.4})",
                    zipcode, result.name, result.latitude, result.longitude
                );
                result.into_location()
            }
            Ok(None) => Err(not_found()),
            Err(e) => {
                warn!("Geocoding zipcode {} failed: {e:#}", zipcode);
                Err(not_found())
            }
        }
    }

    /// Name a location by reverse geocoding; keeps it unnamed on failure
    pub async fn with_place_name(&self, location: Location) -> Location {
        if location.name().is_some() {
            return location;
        }
        match self.geocoder.reverse(location.latitude(), location.longitude()).await {
            Ok(Some(place)) => location.with_name(place.name),
            Ok(None) => location,
            Err(e) => {
                debug!("Reverse geocoding failed: {e:#}, keeping coordinates");
                location
            }
        }
    }
}

/// Why the device position could not be obtained
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Location access was denied. Please allow location access or enter your location manually.")]
    PermissionDenied,
    #[error("Your position is currently unavailable. Please try again or enter your location manually.")]
    PositionUnavailable,
    #[error("Timed out while getting your location. Please try again or enter your location manually.")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

impl DeviceClass {
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        if MOBILE_USER_AGENT.is_match(user_agent) {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

/// Options handed to the position provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl PositionOptions {
    #[must_use]
    pub fn for_device(device: DeviceClass) -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: match device {
                DeviceClass::Mobile => MOBILE_GEOLOCATION_TIMEOUT,
                DeviceClass::Desktop => DESKTOP_GEOLOCATION_TIMEOUT,
            },
            maximum_age: POSITION_MAX_AGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Platform hook for reading the device position
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> std::result::Result<Position, GeolocationError>;
}

/// Device geolocation with timeout and position reuse
pub struct DeviceLocator<P> {
    provider: P,
    options: PositionOptions,
    last_fix: Mutex<Option<(Instant, Position)>>,
}

impl<P: PositionProvider> DeviceLocator<P> {
    pub fn new(provider: P, device: DeviceClass) -> Self {
        Self {
            provider,
            options: PositionOptions::for_device(device),
            last_fix: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    fn cached_fix(&self) -> Option<Position> {
        let guard = self.last_fix.lock().ok()?;
        guard
            .as_ref()
            .filter(|(taken, _)| taken.elapsed() <= self.options.maximum_age)
            .map(|(_, position)| *position)
    }

    pub async fn locate(&self) -> std::result::Result<Location, GeolocationError> {
        let position = match self.cached_fix() {
            Some(position) => {
                debug!("Reusing cached device position");
                position
            }
            None => {
                let position = tokio::time::timeout(
                    self.options.timeout,
                    self.provider.current_position(&self.options),
                )
                .await
                .map_err(|_| GeolocationError::Timeout)??;
                if let Ok(mut guard) = self.last_fix.lock() {
                    *guard = Some((Instant::now(), position));
                }
                position
            }
        };

        Location::new(position.latitude, position.longitude, None).map_err(|e| {
            warn!("Device reported an invalid position: {e}");
            GeolocationError::PositionUnavailable
        })
    }
}
