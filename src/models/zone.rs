//! Dark-sky zone model

use serde::{Deserialize, Serialize};

/// A certified or well-known dark-sky location with its distance from the
/// user's location. The name is the zone's unique key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DarkSkyZone {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Light pollution class, 1 (darkest) to 9 (inner city)
    pub bortle_scale: u8,
    pub designation_type: String,
    pub distance_miles: f64,
    pub description: String,
}
