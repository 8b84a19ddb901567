//! Data models shared by the service and the advisor
//!
//! - Location: validated coordinates
//! - Zone: dark-sky zones with distance
//! - Weather: nightly weather conditions
//! - Astronomy: moon/visibility conditions and daily recommendations

pub mod astronomy;
pub mod location;
pub mod weather;
pub mod zone;

pub use astronomy::{AstronomicalConditions, StargazingRecommendation};
pub use location::{Location, LocationPayload};
pub use weather::{DailyForecast, WeatherConditions};
pub use zone::DarkSkyZone;
