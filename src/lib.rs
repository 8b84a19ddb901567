//! Stargazer - dark-sky zones and stargazing recommendations
//!
//! The service half ranks catalogued dark-sky sites by distance and scores
//! upcoming nights from moonlight, sky darkness and weather. The advisor half
//! holds the client-side ranking, scoring and view state that consume it.

pub mod advisor;
pub mod api;
pub mod astronomy;
pub mod cache;
pub mod config;
pub mod error;
pub mod location_resolver;
pub mod maps;
pub mod models;
pub mod recommendations;
pub mod telemetry;
pub mod weather;
pub mod web;
pub mod zones;

// Re-export core types for public API
pub use advisor::{AdvisorClient, AdvisorSession, AdvisorView};
pub use config::StargazerConfig;
pub use error::StargazerError;
pub use location_resolver::{LocationParser, LocationResolver, NominatimGeocoder};
pub use models::{DarkSkyZone, Location, StargazingRecommendation};
pub use recommendations::RecommendationService;
pub use zones::ZoneCatalog;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, StargazerError>;
