//! Location model for geographic coordinates and metadata

use serde::{Deserialize, Serialize};

use crate::StargazerError;

/// A validated point on the globe. Only constructible through [`Location::new`],
/// so every instance has in-range coordinates.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(try_from = "LocationPayload")]
pub struct Location {
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// Unvalidated wire form of a location, as submitted by clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Location {
    /// Create a location, rejecting out-of-range coordinates
    pub fn new(latitude: f64, longitude: f64, name: Option<String>) -> crate::Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(StargazerError::validation(format!(
                "Latitude must be between -90 and 90, got: {latitude}"
            )));
        }

        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(StargazerError::validation(format!(
                "Longitude must be between -180 and 180, got: {longitude}"
            )));
        }

        Ok(Self {
            latitude,
            longitude,
            name: name.filter(|n| !n.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Copy of this location carrying a display name
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            latitude: self.latitude,
            longitude: self.longitude,
            name: Some(name.into()),
        }
    }

    /// Name if known, otherwise the formatted coordinates
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.format_coordinates())
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Cache key for a forecast of `days` days at this location
    #[must_use]
    pub fn forecast_cache_key(&self, days: u32) -> String {
        let (lat, lon) = self.rounded_coordinates(2);
        format!("weather:{lat:.2}:{lon:.2}:{days}")
    }
}

impl TryFrom<LocationPayload> for Location {
    type Error = StargazerError;

    fn try_from(payload: LocationPayload) -> Result<Self, Self::Error> {
        Location::new(payload.latitude, payload.longitude, payload.name)
    }
}

impl From<&Location> for LocationPayload {
    fn from(location: &Location) -> Self {
        Self {
            latitude: location.latitude,
            longitude: location.longitude,
            name: location.name.clone(),
        }
    }
}
