//! Multi-day stargazing recommendations
//!
//! For each night the moon, the dark window and the astronomy score are
//! computed for the observing site, the night's weather is attached when the
//! forecast is available, and the days are ranked best first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::astronomy::{self, MoonState, ViewingWindow};
use crate::models::{AstronomicalConditions, DarkSkyZone, Location, StargazingRecommendation, WeatherConditions};
use crate::weather::WeatherSource;
use crate::zones::ZoneCatalog;
use crate::{Result, StargazerError};

/// Bortle class assumed when no catalog zone applies
pub const DEFAULT_BORTLE: u8 = 7;
/// Zones listed with each day
pub const ZONES_PER_DAY: usize = 3;

const CATALOG_SOURCE: &str = "dark_sky_catalog";
const DEFAULT_SOURCE: &str = "default";

pub struct RecommendationService {
    catalog: Arc<ZoneCatalog>,
    weather: Arc<dyn WeatherSource>,
    max_days: u32,
}

impl RecommendationService {
    pub fn new(catalog: Arc<ZoneCatalog>, weather: Arc<dyn WeatherSource>, max_days: u32) -> Self {
        Self {
            catalog,
            weather,
            max_days,
        }
    }

    /// Recommendations for `days` nights starting tonight at the observing site
    pub async fn recommend(
        &self,
        location: &Location,
        days: u32,
        zone_name: Option<&str>,
    ) -> Result<Vec<StargazingRecommendation>> {
        self.recommend_at(location, days, zone_name, Utc::now()).await
    }

    /// Recommendations starting with the site's local date at `now`, the same
    /// calendar the weather forecast is keyed by
    #[instrument(skip(self, location), fields(location = %location.format_coordinates()))]
    pub async fn recommend_at(
        &self,
        location: &Location,
        days: u32,
        zone_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StargazingRecommendation>> {
        if !(1..=self.max_days).contains(&days) {
            return Err(StargazerError::validation(format!(
                "days must be between 1 and {}, got: {days}",
                self.max_days
            )));
        }

        let nearby = self.catalog.by_distance(location);
        let (selected, site) = match zone_name {
            Some(name) => {
                let entry = self.catalog.get(name).ok_or_else(|| {
                    StargazerError::not_found(format!("Dark sky zone '{name}' not found"))
                })?;
                let zone = entry.to_zone(location);
                let site = Location::new(zone.latitude, zone.longitude, Some(zone.name.clone()))?;
                (Some(zone), site)
            }
            None => (nearby.first().cloned(), location.clone()),
        };
        let listed = zones_for_day(selected.as_ref(), &nearby);
        let start = astronomy::local_date(&site, now);
        debug!("First night at {} is {start}", site.display_name());

        let weather = self.weather_by_date(&site, days).await;

        let mut recommendations = Vec::with_capacity(days as usize);
        for offset in 0..days {
            let Some(date) = start.checked_add_days(Days::new(offset.into())) else {
                break;
            };
            let conditions = night_conditions(&site, date, selected.as_ref(), weather.get(&date).cloned());
            recommendations.push(StargazingRecommendation {
                date,
                conditions,
                dark_sky_zones: listed.clone(),
            });
        }

        recommendations.sort_by(|a, b| {
            b.conditions
                .visibility_score
                .total_cmp(&a.conditions.visibility_score)
        });

        info!(
            "Built {} recommendations for {}",
            recommendations.len(),
            site.display_name()
        );
        Ok(recommendations)
    }

    async fn weather_by_date(&self, site: &Location, days: u32) -> HashMap<NaiveDate, WeatherConditions> {
        match self.weather.nightly_forecast(site, days).await {
            Ok(forecasts) => forecasts
                .into_iter()
                .map(|forecast| (forecast.date, forecast.weather))
                .collect(),
            Err(e) => {
                warn!("Weather unavailable, recommending on astronomy alone: {e:#}");
                HashMap::new()
            }
        }
    }
}

/// Selected zone first, then the closest others, up to [`ZONES_PER_DAY`]
fn zones_for_day(selected: Option<&DarkSkyZone>, nearby: &[DarkSkyZone]) -> Vec<DarkSkyZone> {
    let mut zones: Vec<DarkSkyZone> = selected.into_iter().cloned().collect();
    zones.extend(
        nearby
            .iter()
            .filter(|zone| selected.is_none_or(|s| s.name != zone.name))
            .cloned(),
    );
    zones.truncate(ZONES_PER_DAY);
    zones
}

fn night_conditions(
    site: &Location,
    date: NaiveDate,
    zone: Option<&DarkSkyZone>,
    weather: Option<WeatherConditions>,
) -> AstronomicalConditions {
    let window = ViewingWindow::for_night(site, date);
    let moon = MoonState::at(window.reference_instant(site, date));
    let (moon_rise_time, moon_set_time) = astronomy::approximate_moon_times(site, date, &moon);

    let (bortle_scale, estimated, source) = match zone {
        Some(zone) => (zone.bortle_scale, false, CATALOG_SOURCE),
        None => (DEFAULT_BORTLE, true, DEFAULT_SOURCE),
    };
    let visibility_score = astronomy::visibility_score(moon.illumination, bortle_scale);
    debug!(
        "{date}: {} at {:.1}%, visibility {visibility_score}",
        moon.phase.name(),
        moon.illumination
    );

    AstronomicalConditions {
        moon_phase: moon.phase.name().to_string(),
        moon_illumination: moon.illumination,
        moon_rise_time,
        moon_set_time,
        best_viewing_start: window.start_label,
        best_viewing_end: window.end_label,
        visibility_score,
        conditions_description: astronomy::conditions_description(visibility_score).to_string(),
        bortle_scale: Some(bortle_scale),
        bortle_estimated: Some(estimated),
        bortle_source: Some(source.to_string()),
        weather,
    }
}
