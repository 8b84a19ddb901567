//! Astronomical conditions and per-day recommendations

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DarkSkyZone, WeatherConditions};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AstronomicalConditions {
    pub moon_phase: String,
    /// Illuminated fraction of the lunar disc, in percent
    pub moon_illumination: f64,
    pub moon_rise_time: Option<String>,
    pub moon_set_time: Option<String>,
    pub best_viewing_start: String,
    pub best_viewing_end: String,
    /// 0-100 astronomy-side quality
    pub visibility_score: f64,
    pub conditions_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bortle_scale: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bortle_estimated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bortle_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherConditions>,
}

/// Conditions for one night plus the zones they were computed for
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StargazingRecommendation {
    pub date: NaiveDate,
    pub conditions: AstronomicalConditions,
    pub dark_sky_zones: Vec<DarkSkyZone>,
}

impl StargazingRecommendation {
    /// Weather score of the day, if weather was available
    #[must_use]
    pub fn weather_score(&self) -> Option<f64> {
        self.conditions.weather.as_ref().map(|w| w.weather_score)
    }
}
