//! Advisor view state and its reducer
//!
//! All UI state lives in [`AdvisorView`] and changes only through
//! [`AdvisorView::update`]. Network work is requested through returned
//! [`ViewEffect`]s; each fetch carries a generation number and responses from
//! superseded generations are dropped, so a slow early response can never
//! overwrite a fresher one.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::disclosure::{CardEffect, CardEvent, TimerSequence, ZoneCard};
use super::ranking::{self, ScoreBand, ZoneSortKey};
use crate::StargazerError;
use crate::models::{DarkSkyZone, Location, StargazingRecommendation};

/// Zones shown before any "load more"
pub const INITIAL_DISPLAY_LIMIT: usize = 5;
/// Zones added per "load more"
pub const LOAD_MORE_INCREMENT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Zones,
    Recommendations,
}

/// Number of days of recommendations the user can ask for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ForecastWindow {
    Three,
    Five,
    #[default]
    Seven,
    Ten,
    Fourteen,
}

impl ForecastWindow {
    pub const ALL: [ForecastWindow; 5] = [
        ForecastWindow::Three,
        ForecastWindow::Five,
        ForecastWindow::Seven,
        ForecastWindow::Ten,
        ForecastWindow::Fourteen,
    ];

    #[must_use]
    pub fn days(&self) -> u32 {
        match self {
            ForecastWindow::Three => 3,
            ForecastWindow::Five => 5,
            ForecastWindow::Seven => 7,
            ForecastWindow::Ten => 10,
            ForecastWindow::Fourteen => 14,
        }
    }
}

impl TryFrom<u32> for ForecastWindow {
    type Error = StargazerError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|w| w.days() == days)
            .ok_or_else(|| {
                StargazerError::validation(format!(
                    "Forecast window must be 3, 5, 7, 10 or 14 days, got: {days}"
                ))
            })
    }
}

impl From<ForecastWindow> for u32 {
    fn from(window: ForecastWindow) -> Self {
        window.days()
    }
}

impl fmt::Display for ForecastWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days", self.days())
    }
}

/// Parameters of one recommendation fetch
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationQuery {
    pub location: Location,
    pub zone_name: Option<String>,
    pub days: ForecastWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Zones,
    Recommendations,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    /// A location was acquired and submitted
    Submit(Location),
    ZonesLoaded {
        generation: u64,
        zones: Vec<DarkSkyZone>,
    },
    RecommendationsLoaded {
        generation: u64,
        recommendations: Vec<StargazingRecommendation>,
    },
    RequestFailed {
        kind: RequestKind,
        generation: u64,
        message: String,
    },
    SortBy(ZoneSortKey),
    LoadMore,
    SelectTab(Tab),
    /// Scope recommendations to a zone, or clear the scope with `None`
    SelectZone(Option<String>),
    SetDays(ForecastWindow),
    DismissError,
    Card {
        zone: String,
        event: CardEvent,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEffect {
    FetchZones {
        generation: u64,
        location: Location,
    },
    FetchRecommendations {
        generation: u64,
        query: RecommendationQuery,
    },
    Card {
        zone: String,
        effect: CardEffect,
    },
}

/// Scores of one recommendation day, ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayScore {
    pub date: NaiveDate,
    pub astronomy_score: f64,
    pub weather_score: Option<f64>,
    pub combined_score: u8,
    pub band: ScoreBand,
}

#[derive(Debug, Clone, Default)]
pub struct AdvisorView {
    location: Option<Location>,
    tab: Tab,
    sort_key: ZoneSortKey,
    display_limit: usize,
    zones: Vec<DarkSkyZone>,
    cards: HashMap<String, ZoneCard>,
    timers: TimerSequence,
    recommendations: Vec<StargazingRecommendation>,
    selected_zone: Option<String>,
    days: ForecastWindow,
    zones_generation: u64,
    recommendations_generation: u64,
    zones_loading: bool,
    recommendations_loading: bool,
    error: Option<String>,
}

impl AdvisorView {
    #[must_use]
    pub fn new() -> Self {
        Self {
            display_limit: INITIAL_DISPLAY_LIMIT,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    #[must_use]
    pub fn tab(&self) -> Tab {
        self.tab
    }

    #[must_use]
    pub fn sort_key(&self) -> ZoneSortKey {
        self.sort_key
    }

    #[must_use]
    pub fn display_limit(&self) -> usize {
        self.display_limit
    }

    #[must_use]
    pub fn selected_zone(&self) -> Option<&str> {
        self.selected_zone.as_deref()
    }

    #[must_use]
    pub fn days(&self) -> ForecastWindow {
        self.days
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.zones_loading || self.recommendations_loading
    }

    #[must_use]
    pub fn all_zones(&self) -> &[DarkSkyZone] {
        &self.zones
    }

    #[must_use]
    pub fn card(&self, zone: &str) -> Option<&ZoneCard> {
        self.cards.get(zone)
    }

    #[must_use]
    pub fn recommendations(&self) -> &[StargazingRecommendation] {
        &self.recommendations
    }

    /// Zones in the chosen order, cut to the display limit
    #[must_use]
    pub fn visible_zones(&self) -> Vec<DarkSkyZone> {
        ranking::visible_zones(&self.zones, self.sort_key, self.display_limit)
    }

    #[must_use]
    pub fn has_more_zones(&self) -> bool {
        self.zones.len() > self.display_limit
    }

    #[must_use]
    pub fn day_scores(&self) -> Vec<DayScore> {
        self.recommendations
            .iter()
            .map(|rec| {
                let combined_score = ranking::recommendation_score(rec);
                DayScore {
                    date: rec.date,
                    astronomy_score: rec.conditions.visibility_score,
                    weather_score: rec.weather_score(),
                    combined_score,
                    band: ScoreBand::from_score(f64::from(combined_score)),
                }
            })
            .collect()
    }

    fn recommendation_fetch(&mut self) -> Option<ViewEffect> {
        let location = self.location.clone()?;
        self.recommendations_generation += 1;
        self.recommendations_loading = true;
        Some(ViewEffect::FetchRecommendations {
            generation: self.recommendations_generation,
            query: RecommendationQuery {
                location,
                zone_name: self.selected_zone.clone(),
                days: self.days,
            },
        })
    }

    /// Apply `action` and return the effects the host must perform
    pub fn update(&mut self, action: ViewAction) -> Vec<ViewEffect> {
        match action {
            ViewAction::Submit(location) => {
                self.location = Some(location.clone());
                self.selected_zone = None;
                self.display_limit = INITIAL_DISPLAY_LIMIT;
                self.error = None;
                self.zones_generation += 1;
                self.zones_loading = true;

                let mut effects = vec![ViewEffect::FetchZones {
                    generation: self.zones_generation,
                    location,
                }];
                effects.extend(self.recommendation_fetch());
                effects
            }
            ViewAction::ZonesLoaded { generation, zones } => {
                if generation != self.zones_generation {
                    debug!("Dropping stale zones response (generation {generation})");
                    return Vec::new();
                }
                self.zones_loading = false;
                let cancelled: Vec<ViewEffect> = self
                    .cards
                    .drain()
                    .filter_map(|(zone, card)| {
                        card.pending_timer().map(|timer| ViewEffect::Card {
                            zone,
                            effect: CardEffect::CancelTimer(timer),
                        })
                    })
                    .collect();
                self.cards = zones
                    .iter()
                    .map(|zone| (zone.name.clone(), ZoneCard::new()))
                    .collect();
                self.zones = zones;
                cancelled
            }
            ViewAction::RecommendationsLoaded {
                generation,
                recommendations,
            } => {
                if generation != self.recommendations_generation {
                    debug!("Dropping stale recommendations response (generation {generation})");
                    return Vec::new();
                }
                self.recommendations_loading = false;
                self.recommendations = recommendations;
                Vec::new()
            }
            ViewAction::RequestFailed {
                kind,
                generation,
                message,
            } => {
                let current = match kind {
                    RequestKind::Zones => self.zones_generation,
                    RequestKind::Recommendations => self.recommendations_generation,
                };
                if generation == current {
                    match kind {
                        RequestKind::Zones => self.zones_loading = false,
                        RequestKind::Recommendations => self.recommendations_loading = false,
                    }
                    self.error = Some(message);
                }
                Vec::new()
            }
            ViewAction::SortBy(key) => {
                self.sort_key = key;
                self.display_limit = INITIAL_DISPLAY_LIMIT;
                Vec::new()
            }
            ViewAction::LoadMore => {
                if self.has_more_zones() {
                    self.display_limit += LOAD_MORE_INCREMENT;
                }
                Vec::new()
            }
            ViewAction::SelectTab(tab) => {
                self.tab = tab;
                Vec::new()
            }
            ViewAction::SelectZone(zone) => {
                self.selected_zone = zone;
                self.recommendation_fetch().into_iter().collect()
            }
            ViewAction::SetDays(days) => {
                self.days = days;
                self.recommendation_fetch().into_iter().collect()
            }
            ViewAction::DismissError => {
                self.error = None;
                Vec::new()
            }
            ViewAction::Card { zone, event } => match self.cards.get_mut(&zone) {
                Some(card) => card
                    .update(event, &mut self.timers)
                    .into_iter()
                    .map(|effect| ViewEffect::Card {
                        zone: zone.clone(),
                        effect,
                    })
                    .collect(),
                None => Vec::new(),
            },
        }
    }
}
