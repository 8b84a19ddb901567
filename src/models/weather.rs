//! Weather conditions attached to a forecast day

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Night-relevant weather summary for one day
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherConditions {
    pub temperature_f: f64,
    pub temperature_c: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Cloud cover percentage
    pub cloud_cover: f64,
    pub visibility_miles: f64,
    pub wind_speed_mph: f64,
    /// Cardinal direction the wind blows from, e.g. "NNE"
    pub wind_direction: String,
    pub condition: String,
    pub condition_description: String,
    /// 0-100, higher is better for stargazing
    pub weather_score: f64,
    /// Precipitation probability percentage
    pub precipitation_chance: f64,
}

impl WeatherConditions {
    /// Convert wind direction from degrees to cardinal direction
    #[must_use]
    pub fn wind_direction_to_cardinal(degrees: u16) -> &'static str {
        match degrees {
            0..=11 | 349..=360 => "N",
            12..=33 => "NNE",
            34..=56 => "NE",
            57..=78 => "ENE",
            79..=101 => "E",
            102..=123 => "ESE",
            124..=146 => "SE",
            147..=168 => "SSE",
            169..=191 => "S",
            192..=213 => "SSW",
            214..=236 => "SW",
            237..=258 => "WSW",
            259..=281 => "W",
            282..=303 => "WNW",
            304..=326 => "NW",
            327..=348 => "NNW",
            _ => "Unknown",
        }
    }

    #[must_use]
    pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
        (fahrenheit - 32.0) * 5.0 / 9.0
    }
}

/// One day of the weather forecast endpoint
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub weather: WeatherConditions,
}
