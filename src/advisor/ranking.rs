//! Zone ranking, combined scores and score banding
//!
//! Everything here is pure: sorting and pagination are view transformations
//! over the zones fetched once per location query.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{DarkSkyZone, StargazingRecommendation};

/// Astronomy share of the combined score
pub const ASTRONOMY_WEIGHT: f64 = 0.6;
/// Weather share of the combined score
pub const WEATHER_WEIGHT: f64 = 0.4;
/// Weather score assumed when a day has no weather data
pub const DEFAULT_WEATHER_SCORE: f64 = 50.0;

/// Criterion the zone list is ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneSortKey {
    #[default]
    Distance,
    Bortle,
    Name,
}

/// Locale-style name ordering: case-insensitive first, exact bytes as tiebreak
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Stable sort of `zones` by `key`, ascending
#[must_use]
pub fn sort_zones(zones: &[DarkSkyZone], key: ZoneSortKey) -> Vec<DarkSkyZone> {
    let mut sorted = zones.to_vec();
    match key {
        ZoneSortKey::Distance => {
            sorted.sort_by(|a, b| a.distance_miles.total_cmp(&b.distance_miles));
        }
        ZoneSortKey::Bortle => sorted.sort_by_key(|zone| zone.bortle_scale),
        ZoneSortKey::Name => sorted.sort_by(|a, b| compare_names(&a.name, &b.name)),
    }
    sorted
}

/// The first `limit` zones in `key` order
#[must_use]
pub fn visible_zones(zones: &[DarkSkyZone], key: ZoneSortKey, limit: usize) -> Vec<DarkSkyZone> {
    let mut sorted = sort_zones(zones, key);
    sorted.truncate(limit);
    sorted
}

/// Overall quality of a day: `round(A * 0.6 + W * 0.4)`, with W = 50 when
/// weather is unknown.
#[must_use]
pub fn combined_score(astronomy_score: f64, weather_score: Option<f64>) -> u8 {
    let weather = weather_score.unwrap_or(DEFAULT_WEATHER_SCORE);
    let combined = (astronomy_score * ASTRONOMY_WEIGHT + weather * WEATHER_WEIGHT).round();
    combined.clamp(0.0, 100.0) as u8
}

/// Combined score for a recommendation day
#[must_use]
pub fn recommendation_score(recommendation: &StargazingRecommendation) -> u8 {
    combined_score(
        recommendation.conditions.visibility_score,
        recommendation.weather_score(),
    )
}

/// Quality band shared by every score in the advisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ScoreBand {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ScoreBand::Excellent
        } else if score >= 60.0 {
            ScoreBand::Good
        } else if score >= 40.0 {
            ScoreBand::Fair
        } else {
            ScoreBand::Poor
        }
    }

    /// Band of a zone's sky darkness, mapping Bortle 1..9 onto 100..0
    #[must_use]
    pub fn from_bortle(bortle_scale: u8) -> Self {
        Self::from_score(bortle_quality(bortle_scale))
    }

    #[must_use]
    pub fn color(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => "green",
            ScoreBand::Good => "yellow",
            ScoreBand::Fair => "orange",
            ScoreBand::Poor => "red",
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Excellent",
            ScoreBand::Good => "Good",
            ScoreBand::Fair => "Fair",
            ScoreBand::Poor => "Poor",
        }
    }
}

/// Sky darkness of a Bortle class on the 0-100 score scale
#[must_use]
pub fn bortle_quality(bortle_scale: u8) -> f64 {
    let bortle = f64::from(bortle_scale.clamp(1, 9));
    (9.0 - bortle) / 8.0 * 100.0
}
