//! Dark-sky zone catalog and nearest-zone search
//!
//! The catalog ships inside the binary as JSON. Distances are great-circle
//! distances from the user's location, in miles rounded to two decimals.

use std::collections::HashSet;

use haversine::{Location as HaversineLocation, Units, distance};
use serde::Deserialize;
use tracing::debug;

use crate::StargazerError;
use crate::models::{DarkSkyZone, Location};

const EMBEDDED_CATALOG: &str = include_str!("../data/dark_sky_zones.json");

/// A catalog record before a distance has been attached
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bortle_scale: u8,
    pub designation_type: String,
    pub description: String,
}

impl CatalogEntry {
    /// Attach the distance from `origin` to this entry
    #[must_use]
    pub fn to_zone(&self, origin: &Location) -> DarkSkyZone {
        let miles = distance(
            HaversineLocation {
                latitude: origin.latitude(),
                longitude: origin.longitude(),
            },
            HaversineLocation {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            Units::Miles,
        );

        DarkSkyZone {
            name: self.name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            bortle_scale: self.bortle_scale,
            designation_type: self.designation_type.clone(),
            distance_miles: (miles * 100.0).round() / 100.0,
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZoneCatalog {
    entries: Vec<CatalogEntry>,
}

impl ZoneCatalog {
    /// Load the catalog compiled into the binary
    pub fn embedded() -> crate::Result<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Parse and validate a catalog from JSON
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)
            .map_err(|e| StargazerError::config(format!("Invalid zone catalog: {e}")))?;
        Self::new(entries)
    }

    pub fn new(entries: Vec<CatalogEntry>) -> crate::Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !(1..=9).contains(&entry.bortle_scale) {
                return Err(StargazerError::config(format!(
                    "Zone '{}' has Bortle class {} outside 1-9",
                    entry.name, entry.bortle_scale
                )));
            }
            Location::new(entry.latitude, entry.longitude, None).map_err(|e| {
                StargazerError::config(format!("Zone '{}': {}", entry.name, e.user_message()))
            })?;
            if !seen.insert(entry.name.as_str()) {
                return Err(StargazerError::config(format!(
                    "Duplicate zone name '{}'",
                    entry.name
                )));
            }
        }

        debug!("Loaded zone catalog with {} entries", entries.len());
        Ok(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a zone by its exact name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// All zones ordered by distance from `origin`, closest first
    #[must_use]
    pub fn by_distance(&self, origin: &Location) -> Vec<DarkSkyZone> {
        let mut zones: Vec<DarkSkyZone> = self.entries.iter().map(|e| e.to_zone(origin)).collect();
        zones.sort_by(|a, b| a.distance_miles.total_cmp(&b.distance_miles));
        zones
    }

    /// The `limit` closest zones to `origin`
    #[must_use]
    pub fn find_nearest(&self, origin: &Location, limit: usize) -> Vec<DarkSkyZone> {
        let mut zones = self.by_distance(origin);
        zones.truncate(limit);
        zones
    }
}
