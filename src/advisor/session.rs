//! Async driver connecting the view reducer to the backend
//!
//! Fetches and hint timers run as spawned tasks that report back over a
//! channel, so the view keeps taking actions while work is in flight. A
//! response from a superseded request is dropped by the reducer, and a
//! cancelled hint timer is aborted before it can fire.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::client::AdvisorBackend;
use super::disclosure::{CardEffect, CardEvent, TimerId};
use super::view::{AdvisorView, RecommendationQuery, RequestKind, ViewAction, ViewEffect};
use crate::models::Location;

/// Work finished by a spawned task
#[derive(Debug)]
enum Completion {
    Fetch(ViewAction),
    Timer { zone: String, timer: TimerId },
}

/// Owns the view state and runs the work its reducer asks for
pub struct AdvisorSession<B> {
    backend: Arc<B>,
    view: AdvisorView,
    zone_fetch_limit: usize,
    sender: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    fetches_in_flight: usize,
    timers: HashMap<(String, TimerId), JoinHandle<()>>,
}

impl<B: AdvisorBackend + 'static> AdvisorSession<B> {
    pub fn new(backend: B, zone_fetch_limit: usize) -> Self {
        let (sender, completions) = mpsc::unbounded_channel();
        Self {
            backend: Arc::new(backend),
            view: AdvisorView::new(),
            zone_fetch_limit,
            sender,
            completions,
            fetches_in_flight: 0,
            timers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn view(&self) -> &AdvisorView {
        &self.view
    }

    /// No fetch is running and no hint timer is pending
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.fetches_in_flight == 0 && self.timers.is_empty()
    }

    pub fn submit(&mut self, location: Location) {
        info!("Submitting location {}", location.display_name());
        self.dispatch(ViewAction::Submit(location));
    }

    /// Apply `action` and start the work it triggers without waiting for it
    pub fn dispatch(&mut self, action: ViewAction) {
        for effect in self.view.update(action) {
            self.start(effect);
        }
    }

    /// Wait for the next finished fetch or elapsed hint timer and apply it.
    /// Returns `false` when nothing is outstanding.
    pub async fn process_next(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }
        let Some(completion) = self.completions.recv().await else {
            return false;
        };

        match completion {
            Completion::Fetch(action) => {
                self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);
                self.dispatch(action);
            }
            Completion::Timer { zone, timer } => {
                // Cancelled after it had already fired
                if self.timers.remove(&(zone.clone(), timer)).is_none() {
                    return true;
                }
                self.dispatch(ViewAction::Card {
                    zone,
                    event: CardEvent::HintTimerFired(timer),
                });
            }
        }
        true
    }

    /// Apply completions until nothing is outstanding
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    fn start(&mut self, effect: ViewEffect) {
        match effect {
            ViewEffect::FetchZones { generation, location } => {
                let backend = Arc::clone(&self.backend);
                let limit = self.zone_fetch_limit;
                self.spawn_fetch(async move { fetch_zones(backend.as_ref(), limit, generation, location).await });
            }
            ViewEffect::FetchRecommendations { generation, query } => {
                let backend = Arc::clone(&self.backend);
                self.spawn_fetch(async move { fetch_recommendations(backend.as_ref(), generation, query).await });
            }
            ViewEffect::Card {
                zone,
                effect: CardEffect::ScheduleHint { timer, delay },
            } => {
                let sender = self.sender.clone();
                let key = (zone.clone(), timer);
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = sender.send(Completion::Timer { zone, timer });
                });
                self.timers.insert(key, handle);
            }
            ViewEffect::Card {
                zone,
                effect: CardEffect::CancelTimer(timer),
            } => {
                if let Some(handle) = self.timers.remove(&(zone, timer)) {
                    debug!("Cancelling hint timer {}", timer.0);
                    handle.abort();
                }
            }
        }
    }

    fn spawn_fetch<F>(&mut self, fetch: F)
    where
        F: Future<Output = ViewAction> + Send + 'static,
    {
        self.fetches_in_flight += 1;
        debug!("{} fetches in flight", self.fetches_in_flight);
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let _ = sender.send(Completion::Fetch(fetch.await));
        });
    }
}

impl<B> Drop for AdvisorSession<B> {
    fn drop(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

async fn fetch_zones<B: AdvisorBackend>(backend: &B, limit: usize, generation: u64, location: Location) -> ViewAction {
    match backend.find_dark_sky_zones(&location, limit).await {
        Ok(zones) => ViewAction::ZonesLoaded { generation, zones },
        Err(e) => ViewAction::RequestFailed {
            kind: RequestKind::Zones,
            generation,
            message: e.user_message(),
        },
    }
}

async fn fetch_recommendations<B: AdvisorBackend>(
    backend: &B,
    generation: u64,
    query: RecommendationQuery,
) -> ViewAction {
    let result = backend
        .stargazing_recommendations(&query.location, query.days.days(), query.zone_name.as_deref())
        .await;
    match result {
        Ok(recommendations) => ViewAction::RecommendationsLoaded {
            generation,
            recommendations,
        },
        Err(e) => ViewAction::RequestFailed {
            kind: RequestKind::Recommendations,
            generation,
            message: e.user_message(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::disclosure::{CardPhase, HINT_DELAY};
    use crate::advisor::view::ForecastWindow;
    use crate::models::{AstronomicalConditions, DarkSkyZone, StargazingRecommendation};
    use crate::{Result, StargazerError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[derive(Debug, Clone, PartialEq)]
    struct RecommendationCall {
        location: Location,
        days: u32,
        zone: Option<String>,
    }

    /// Records calls; both calls of a submit must be in flight together to
    /// pass the barrier
    struct RecordingBackend {
        barrier: Barrier,
        zone_calls: AtomicUsize,
        zone_locations: Mutex<Vec<Location>>,
        recommendation_calls: Mutex<Vec<RecommendationCall>>,
        fail_recommendations: bool,
        /// Requests for this many days answer late
        slow_days: Option<u32>,
    }

    impl RecordingBackend {
        fn new() -> Self {
            Self {
                barrier: Barrier::new(2),
                zone_calls: AtomicUsize::new(0),
                zone_locations: Mutex::new(Vec::new()),
                recommendation_calls: Mutex::new(Vec::new()),
                fail_recommendations: false,
                slow_days: None,
            }
        }
    }

    fn zone(name: &str) -> DarkSkyZone {
        DarkSkyZone {
            name: name.to_string(),
            latitude: 36.5,
            longitude: -116.9,
            bortle_scale: 1,
            designation_type: "International Dark Sky Park".to_string(),
            distance_miles: 120.0,
            description: "Remote desert".to_string(),
        }
    }

    fn recommendation(day: u32) -> StargazingRecommendation {
        StargazingRecommendation {
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            conditions: AstronomicalConditions {
                moon_phase: "Waxing Crescent".to_string(),
                moon_illumination: 12.0,
                moon_rise_time: None,
                moon_set_time: None,
                best_viewing_start: "22:10".to_string(),
                best_viewing_end: "04:05".to_string(),
                visibility_score: 80.0,
                conditions_description: String::new(),
                bortle_scale: Some(1),
                bortle_estimated: Some(false),
                bortle_source: Some("dark_sky_catalog".to_string()),
                weather: None,
            },
            dark_sky_zones: vec![zone("Death Valley National Park")],
        }
    }

    #[async_trait]
    impl AdvisorBackend for RecordingBackend {
        async fn find_dark_sky_zones(&self, location: &Location, _limit: usize) -> Result<Vec<DarkSkyZone>> {
            self.zone_calls.fetch_add(1, Ordering::SeqCst);
            self.zone_locations.lock().unwrap().push(location.clone());
            self.barrier.wait().await;
            Ok(vec![zone("Death Valley National Park"), zone("Great Basin National Park")])
        }

        async fn stargazing_recommendations(
            &self,
            location: &Location,
            days: u32,
            zone_name: Option<&str>,
        ) -> Result<Vec<StargazingRecommendation>> {
            let first = {
                let mut calls = self.recommendation_calls.lock().unwrap();
                calls.push(RecommendationCall {
                    location: location.clone(),
                    days,
                    zone: zone_name.map(str::to_string),
                });
                calls.len() == 1
            };
            if first {
                self.barrier.wait().await;
            }
            if self.slow_days == Some(days) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            if self.fail_recommendations {
                return Err(StargazerError::api("Weather service unavailable"));
            }
            Ok((1..=days).map(recommendation).collect())
        }
    }

    fn location() -> Location {
        Location::new(36.1699, -115.1398, Some("Las Vegas".to_string())).unwrap()
    }

    async fn settled(backend: RecordingBackend) -> AdvisorSession<RecordingBackend> {
        let mut session = AdvisorSession::new(backend, 50);
        session.submit(location());
        session.settle().await;
        session
    }

    fn card(zone: &str, event: CardEvent) -> ViewAction {
        ViewAction::Card {
            zone: zone.to_string(),
            event,
        }
    }

    #[tokio::test]
    async fn test_submit_fires_both_requests_concurrently() {
        let mut session = AdvisorSession::new(RecordingBackend::new(), 50);
        session.submit(location());
        assert!(!session.is_idle());

        tokio::time::timeout(Duration::from_secs(5), session.settle())
            .await
            .expect("zones and recommendations should be requested concurrently");

        assert_eq!(session.backend.zone_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*session.backend.zone_locations.lock().unwrap(), vec![location()]);
        assert_eq!(
            *session.backend.recommendation_calls.lock().unwrap(),
            vec![RecommendationCall {
                location: location(),
                days: 7,
                zone: None
            }]
        );

        let view = session.view();
        assert!(session.is_idle());
        assert!(!view.is_loading());
        assert_eq!(view.all_zones().len(), 2);
        assert_eq!(view.recommendations().len(), 7);
    }

    #[tokio::test]
    async fn test_day_window_change_refetches_with_active_zone() {
        let mut session = settled(RecordingBackend::new()).await;
        session.dispatch(ViewAction::SelectZone(Some("Great Basin National Park".to_string())));
        session.settle().await;
        session.dispatch(ViewAction::SetDays(ForecastWindow::Fourteen));
        session.settle().await;

        let calls = session.backend.recommendation_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].zone.as_deref(), Some("Great Basin National Park"));
        assert_eq!(calls[2].days, 14);
        assert_eq!(calls[2].location, location());
        assert_eq!(session.backend.zone_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.view().recommendations().len(), 14);
    }

    #[tokio::test]
    async fn test_day_window_change_during_slow_fetch_wins() {
        let backend = RecordingBackend {
            slow_days: Some(7),
            ..RecordingBackend::new()
        };
        let mut session = AdvisorSession::new(backend, 50);
        session.submit(location());
        // Applied while the seven-day request is still outstanding
        session.dispatch(ViewAction::SetDays(ForecastWindow::Three));
        session.settle().await;

        let days: Vec<u32> = session
            .backend
            .recommendation_calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.days)
            .collect();
        assert_eq!(days, vec![7, 3]);
        assert_eq!(session.view().days(), ForecastWindow::Three);
        assert_eq!(session.view().recommendations().len(), 3);
        assert!(!session.view().is_loading());
    }

    #[tokio::test]
    async fn test_failed_request_sets_dismissable_error() {
        let backend = RecordingBackend {
            fail_recommendations: true,
            ..RecordingBackend::new()
        };
        let mut session = settled(backend).await;

        assert_eq!(session.view().error(), Some("Weather service unavailable"));
        assert_eq!(session.view().all_zones().len(), 2);

        session.dispatch(ViewAction::DismissError);
        assert_eq!(session.view().error(), None);
    }

    #[tokio::test]
    async fn test_hint_returns_after_collapse_delay() {
        let mut session = settled(RecordingBackend::new()).await;
        let zone = "Death Valley National Park";

        session.dispatch(card(zone, CardEvent::Toggle));
        assert!(session.is_idle());
        session.dispatch(card(zone, CardEvent::Toggle));
        assert!(!session.is_idle());
        assert!(!session.view().card(zone).unwrap().hint_visible());

        tokio::time::timeout(Duration::from_secs(5), session.settle())
            .await
            .expect("hint timer should fire");
        let card = session.view().card(zone).unwrap();
        assert_eq!(card.phase(), CardPhase::Collapsing);
        assert!(card.hint_visible());
        assert_eq!(card.hint_key(), 1);
    }

    #[tokio::test]
    async fn test_reopening_aborts_pending_hint_timer() {
        let mut session = settled(RecordingBackend::new()).await;
        let zone = "Great Basin National Park";

        session.dispatch(card(zone, CardEvent::Toggle));
        session.dispatch(card(zone, CardEvent::Toggle));
        assert!(!session.is_idle());
        session.dispatch(card(zone, CardEvent::Toggle));
        assert!(session.is_idle());

        tokio::time::sleep(HINT_DELAY * 2).await;
        assert!(!session.process_next().await);
        let card = session.view().card(zone).unwrap();
        assert_eq!(card.phase(), CardPhase::Expanding);
        assert!(!card.hint_visible());
    }
}
