//! `OpenMeteo` API response structures and conversion utilities

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;

use crate::models::{DailyForecast, WeatherConditions};

use super::weather_score;

const METERS_PER_MILE: f64 = 1609.344;
const FEET_PER_MILE: f64 = 5280.0;

/// Hourly variables requested from the forecast endpoint
pub const HOURLY_VARIABLES: &str = "temperature_2m,relative_humidity_2m,cloud_cover,precipitation_probability,wind_speed_10m,wind_direction_10m,visibility,weather_code";

/// Forecast response from `OpenMeteo`
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    pub hourly_units: Option<HourlyUnits>,
    pub hourly: Option<HourlyData>,
}

#[derive(Debug, Deserialize)]
pub struct HourlyUnits {
    pub visibility: Option<String>,
}

/// Hourly weather data from `OpenMeteo`; timestamps are local to the location
#[derive(Debug, Deserialize)]
pub struct HourlyData {
    pub time: Vec<String>,
    #[serde(rename = "temperature_2m")]
    pub temperature: Option<Vec<Option<f64>>>,
    #[serde(rename = "relative_humidity_2m")]
    pub humidity: Option<Vec<Option<f64>>>,
    pub cloud_cover: Option<Vec<Option<f64>>>,
    pub precipitation_probability: Option<Vec<Option<f64>>>,
    #[serde(rename = "wind_speed_10m")]
    pub wind_speed: Option<Vec<Option<f64>>>,
    #[serde(rename = "wind_direction_10m")]
    pub wind_direction: Option<Vec<Option<f64>>>,
    pub visibility: Option<Vec<Option<f64>>>,
    pub weather_code: Option<Vec<Option<u8>>>,
}

/// Error payload returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub reason: String,
}

/// Convert `OpenMeteo` weather code to a short condition and description
#[must_use]
pub fn weather_code_to_condition(code: u8) -> (&'static str, &'static str) {
    match code {
        0 => ("Clear", "Clear sky"),
        1 => ("Clear", "Mainly clear"),
        2 => ("Clouds", "Partly cloudy"),
        3 => ("Clouds", "Overcast"),
        45 => ("Fog", "Fog"),
        48 => ("Fog", "Depositing rime fog"),
        51 => ("Drizzle", "Light drizzle"),
        53 => ("Drizzle", "Moderate drizzle"),
        55 => ("Drizzle", "Dense drizzle"),
        56 => ("Drizzle", "Light freezing drizzle"),
        57 => ("Drizzle", "Dense freezing drizzle"),
        61 => ("Rain", "Slight rain"),
        63 => ("Rain", "Moderate rain"),
        65 => ("Rain", "Heavy rain"),
        66 => ("Rain", "Light freezing rain"),
        67 => ("Rain", "Heavy freezing rain"),
        71 => ("Snow", "Slight snow fall"),
        73 => ("Snow", "Moderate snow fall"),
        75 => ("Snow", "Heavy snow fall"),
        77 => ("Snow", "Snow grains"),
        80 => ("Rain", "Slight rain showers"),
        81 => ("Rain", "Moderate rain showers"),
        82 => ("Rain", "Violent rain showers"),
        85 => ("Snow", "Slight snow showers"),
        86 => ("Snow", "Heavy snow showers"),
        95 => ("Thunderstorm", "Thunderstorm"),
        96 => ("Thunderstorm", "Thunderstorm with slight hail"),
        99 => ("Thunderstorm", "Thunderstorm with heavy hail"),
        _ => ("Unknown", "Unknown"),
    }
}

/// One parsed hour of the forecast
#[derive(Debug, Clone, Default)]
struct HourSample {
    temperature: Option<f64>,
    humidity: Option<f64>,
    cloud_cover: Option<f64>,
    precipitation_probability: Option<f64>,
    wind_speed: Option<f64>,
    wind_direction: Option<f64>,
    visibility_miles: Option<f64>,
    weather_code: Option<u8>,
}

fn value_at(series: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    series.as_ref().and_then(|values| values.get(i).copied().flatten())
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Circular mean of wind directions in degrees
fn mean_direction(degrees: impl Iterator<Item = f64>) -> Option<u16> {
    let (sin, cos, count) = degrees.fold((0.0, 0.0, 0usize), |(s, c, n), d| {
        let r = d.to_radians();
        (s + r.sin(), c + r.cos(), n + 1)
    });
    if count == 0 {
        return None;
    }
    let angle = sin.atan2(cos).to_degrees().rem_euclid(360.0);
    Some(angle.round() as u16 % 360)
}

/// Night of `date`: 20:00 that evening until 04:59 the next morning
fn night_of(timestamp: NaiveDateTime) -> Option<NaiveDate> {
    match timestamp.hour() {
        20..=23 => Some(timestamp.date()),
        0..=4 => timestamp.date().pred_opt(),
        _ => None,
    }
}

impl ForecastResponse {
    fn visibility_to_miles(&self, raw: f64) -> f64 {
        let unit = self
            .hourly_units
            .as_ref()
            .and_then(|u| u.visibility.as_deref())
            .unwrap_or("m");
        if unit.eq_ignore_ascii_case("ft") {
            raw / FEET_PER_MILE
        } else {
            raw / METERS_PER_MILE
        }
    }

    /// Aggregate hourly data into one night-time summary per date, starting
    /// with the first forecast date and returning at most `days` entries
    #[must_use]
    pub fn into_nightly_forecasts(self, days: usize) -> Vec<DailyForecast> {
        let Some(hourly) = &self.hourly else {
            return Vec::new();
        };

        let first_date = hourly
            .time
            .first()
            .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M").ok())
            .map(|t| t.date());
        let Some(first_date) = first_date else {
            return Vec::new();
        };

        let mut nights: Vec<(NaiveDate, Vec<HourSample>)> = Vec::new();
        for (i, raw_time) in hourly.time.iter().enumerate() {
            let Ok(timestamp) = NaiveDateTime::parse_from_str(raw_time, "%Y-%m-%dT%H:%M") else {
                continue;
            };
            let Some(date) = night_of(timestamp) else {
                continue;
            };
            if date < first_date {
                continue;
            }

            let sample = HourSample {
                temperature: value_at(&hourly.temperature, i),
                humidity: value_at(&hourly.humidity, i),
                cloud_cover: value_at(&hourly.cloud_cover, i),
                precipitation_probability: value_at(&hourly.precipitation_probability, i),
                wind_speed: value_at(&hourly.wind_speed, i),
                wind_direction: value_at(&hourly.wind_direction, i),
                visibility_miles: value_at(&hourly.visibility, i).map(|v| self.visibility_to_miles(v)),
                weather_code: hourly
                    .weather_code
                    .as_ref()
                    .and_then(|codes| codes.get(i).copied().flatten()),
            };

            match nights.last_mut() {
                Some((last, samples)) if *last == date => samples.push(sample),
                _ => nights.push((date, vec![sample])),
            }
        }

        nights
            .into_iter()
            .take(days)
            .map(|(date, samples)| DailyForecast {
                date,
                weather: summarize_night(&samples),
            })
            .collect()
    }
}

fn summarize_night(samples: &[HourSample]) -> WeatherConditions {
    let temperature_f = round1(mean(samples.iter().filter_map(|s| s.temperature)).unwrap_or(50.0));
    let humidity = round1(mean(samples.iter().filter_map(|s| s.humidity)).unwrap_or(50.0));
    let cloud_cover = round1(mean(samples.iter().filter_map(|s| s.cloud_cover)).unwrap_or(0.0));
    let precipitation_chance = samples
        .iter()
        .filter_map(|s| s.precipitation_probability)
        .fold(0.0, f64::max);
    let wind_speed_mph = round1(samples.iter().filter_map(|s| s.wind_speed).fold(0.0, f64::max));
    let visibility_miles =
        round1(mean(samples.iter().filter_map(|s| s.visibility_miles)).unwrap_or(10.0));
    let wind_direction = mean_direction(samples.iter().filter_map(|s| s.wind_direction))
        .map_or("Unknown", WeatherConditions::wind_direction_to_cardinal);
    // The most severe code of the night describes it best
    let code = samples.iter().filter_map(|s| s.weather_code).max().unwrap_or(0);
    let (condition, condition_description) = weather_code_to_condition(code);

    let mut conditions = WeatherConditions {
        temperature_f,
        temperature_c: round1(WeatherConditions::fahrenheit_to_celsius(temperature_f)),
        humidity,
        cloud_cover,
        visibility_miles,
        wind_speed_mph,
        wind_direction: wind_direction.to_string(),
        condition: condition.to_string(),
        condition_description: condition_description.to_string(),
        weather_score: 0.0,
        precipitation_chance,
    };
    conditions.weather_score = weather_score(&conditions);
    conditions
}
