//! Moon phase, viewing windows and visibility scoring

use std::f64::consts::PI;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sunrise::{Coordinates, DawnType, SolarDay, SolarEvent};
use tzf_rs::DefaultFinder;

use crate::models::Location;

/// Mean length of a lunation in days
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_853;

/// Time between successive moonrises
const LUNAR_DAY_MINUTES: f64 = 24.0 * 60.0 + 50.0;

const FALLBACK_VIEWING_START: &str = "21:00";
const FALLBACK_VIEWING_END: &str = "05:00";

static TZ_FINDER: LazyLock<DefaultFinder> = LazyLock::new(DefaultFinder::new);

/// Reference new moon: 2000-01-06 18:14 UTC
fn reference_new_moon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoonPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl MoonPhase {
    /// Phase for a position in the lunation, 0.0 (new) to 1.0 (next new)
    #[must_use]
    pub fn from_cycle_fraction(fraction: f64) -> Self {
        match fraction.rem_euclid(1.0) {
            f if f < 0.0339 => MoonPhase::NewMoon,
            f if f < 0.216 => MoonPhase::WaxingCrescent,
            f if f < 0.284 => MoonPhase::FirstQuarter,
            f if f < 0.466 => MoonPhase::WaxingGibbous,
            f if f < 0.534 => MoonPhase::FullMoon,
            f if f < 0.716 => MoonPhase::WaningGibbous,
            f if f < 0.784 => MoonPhase::LastQuarter,
            f if f < 0.9661 => MoonPhase::WaningCrescent,
            _ => MoonPhase::NewMoon,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "New Moon",
            MoonPhase::WaxingCrescent => "Waxing Crescent",
            MoonPhase::FirstQuarter => "First Quarter",
            MoonPhase::WaxingGibbous => "Waxing Gibbous",
            MoonPhase::FullMoon => "Full Moon",
            MoonPhase::WaningGibbous => "Waning Gibbous",
            MoonPhase::LastQuarter => "Last Quarter",
            MoonPhase::WaningCrescent => "Waning Crescent",
        }
    }
}

/// State of the moon at an instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoonState {
    pub phase: MoonPhase,
    /// Illuminated percentage, rounded to 0.1
    pub illumination: f64,
    /// Position in the lunation, 0.0 to 1.0
    pub cycle_fraction: f64,
}

impl MoonState {
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        let elapsed_days = (instant - reference_new_moon()).num_seconds() as f64 / 86_400.0;
        let cycle_fraction = elapsed_days.rem_euclid(SYNODIC_MONTH_DAYS) / SYNODIC_MONTH_DAYS;
        let illumination = (1.0 - (2.0 * PI * cycle_fraction).cos()) / 2.0 * 100.0;

        Self {
            phase: MoonPhase::from_cycle_fraction(cycle_fraction),
            illumination: (illumination * 10.0).round() / 10.0,
            cycle_fraction,
        }
    }
}

/// Time zone of a location, UTC when the lookup fails
#[must_use]
pub fn local_time_zone(location: &Location) -> Tz {
    Tz::from_str(TZ_FINDER.get_tz_name(location.longitude(), location.latitude())).unwrap_or(Tz::UTC)
}

/// Calendar date at `location` for `instant`
#[must_use]
pub fn local_date(location: &Location, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&local_time_zone(location)).date_naive()
}

fn format_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

/// Dark-sky window for the night starting on `date`
#[derive(Debug, Clone, PartialEq)]
pub struct ViewingWindow {
    /// Astronomical dusk, absent when the sky never gets fully dark
    pub start: Option<DateTime<Utc>>,
    /// Astronomical dawn of the following morning
    pub end: Option<DateTime<Utc>>,
    pub start_label: String,
    pub end_label: String,
}

impl ViewingWindow {
    #[must_use]
    pub fn for_night(location: &Location, date: NaiveDate) -> Self {
        let tz = local_time_zone(location);
        let (start, end) = match Coordinates::new(location.latitude(), location.longitude()) {
            Some(coordinates) => {
                let dusk = SolarDay::new(coordinates, date)
                    .event_time(SolarEvent::Dusk(DawnType::Astronomical));
                let dawn = date.succ_opt().and_then(|next| {
                    SolarDay::new(coordinates, next)
                        .event_time(SolarEvent::Dawn(DawnType::Astronomical))
                });
                match (dusk, dawn) {
                    (Some(dusk), Some(dawn)) if dawn > dusk => (Some(dusk), Some(dawn)),
                    _ => (None, None),
                }
            }
            None => (None, None),
        };

        Self {
            start,
            end,
            start_label: start.map_or_else(|| FALLBACK_VIEWING_START.to_string(), |s| format_local(s, tz)),
            end_label: end.map_or_else(|| FALLBACK_VIEWING_END.to_string(), |e| format_local(e, tz)),
        }
    }

    /// Instant the night's conditions are evaluated at
    #[must_use]
    pub fn reference_instant(&self, location: &Location, date: NaiveDate) -> DateTime<Utc> {
        self.start.unwrap_or_else(|| {
            let tz = local_time_zone(location);
            let evening = date.and_time(NaiveTime::from_hms_opt(21, 0, 0).unwrap_or_default());
            tz.from_local_datetime(&evening)
                .earliest()
                .map_or_else(|| evening.and_utc(), |local| local.with_timezone(&Utc))
        })
    }
}

/// Approximate local moonrise and moonset for `date`.
///
/// The moon rises with the sun at new moon and lags it by its age in lunar
/// days; accurate to within an hour or so, which is all the display needs.
#[must_use]
pub fn approximate_moon_times(
    location: &Location,
    date: NaiveDate,
    moon: &MoonState,
) -> (Option<String>, Option<String>) {
    let Some(coordinates) = Coordinates::new(location.latitude(), location.longitude()) else {
        return (None, None);
    };
    let tz = local_time_zone(location);
    let day = SolarDay::new(coordinates, date);
    let lag = Duration::minutes((moon.cycle_fraction * LUNAR_DAY_MINUTES).round() as i64);

    let rise = day
        .event_time(SolarEvent::Sunrise)
        .map(|sunrise| format_local(sunrise + lag, tz));
    let set = day
        .event_time(SolarEvent::Sunset)
        .map(|sunset| format_local(sunset + lag, tz));
    (rise, set)
}

/// Astronomy-side quality, 0-100: 60% sky darkness from the Bortle class,
/// 40% moonlight. Rounded to one decimal.
#[must_use]
pub fn visibility_score(moon_illumination: f64, bortle_scale: u8) -> f64 {
    let bortle = f64::from(bortle_scale.clamp(1, 9));
    let bortle_score = (9.0 - bortle) / 8.0;
    let moon_score = (100.0 - moon_illumination.clamp(0.0, 100.0)) / 100.0;
    let score = (bortle_score * 0.6 + moon_score * 0.4) * 100.0;
    (score * 10.0).round() / 10.0
}

#[must_use]
pub fn conditions_description(visibility_score: f64) -> &'static str {
    if visibility_score >= 80.0 {
        "Excellent conditions - Perfect for deep-sky observations and astrophotography"
    } else if visibility_score >= 60.0 {
        "Good conditions - Suitable for most astronomical observations"
    } else if visibility_score >= 40.0 {
        "Fair conditions - Basic stargazing possible, limited deep-sky viewing"
    } else {
        "Poor conditions - Only bright objects visible"
    }
}
