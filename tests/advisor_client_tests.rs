//! Advisor client against the real router served on a local port

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{Days, Utc};
use tokio::net::TcpListener;

use stargazer::advisor::{AdvisorBackend, AdvisorClient, AdvisorSession, ForecastWindow, ViewAction};
use stargazer::api::{AppState, create_router};
use stargazer::astronomy::local_date;
use stargazer::config::{ClientConfig, SearchConfig};
use stargazer::models::{DailyForecast, Location, WeatherConditions};
use stargazer::weather::WeatherSource;
use stargazer::{StargazerError, ZoneCatalog};

struct ClearNights {
    available: bool,
}

#[async_trait]
impl WeatherSource for ClearNights {
    async fn nightly_forecast(&self, location: &Location, days: u32) -> anyhow::Result<Vec<DailyForecast>> {
        if !self.available {
            return Err(anyhow!("upstream unavailable"));
        }
        let tonight = local_date(location, Utc::now());
        Ok((0..days)
            .map(|offset| DailyForecast {
                date: tonight + Days::new(offset.into()),
                weather: WeatherConditions {
                    temperature_f: 48.0,
                    temperature_c: 8.9,
                    humidity: 35.0,
                    cloud_cover: 5.0,
                    visibility_miles: 20.0,
                    wind_speed_mph: 4.0,
                    wind_direction: "SW".to_string(),
                    condition: "Clear".to_string(),
                    condition_description: "Clear sky".to_string(),
                    weather_score: 97.0,
                    precipitation_chance: 0.0,
                },
            })
            .collect())
    }
}

/// Serve the API on an ephemeral port and return a client pointed at it
async fn serve(weather_available: bool, requests_per_minute: u32) -> AdvisorClient {
    let state = AppState::new(
        ZoneCatalog::embedded().unwrap(),
        Arc::new(ClearNights {
            available: weather_available,
        }),
        SearchConfig::default(),
        requests_per_minute,
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    let config = ClientConfig {
        api_base_url: format!("http://{addr}/"),
        ..ClientConfig::default()
    };
    AdvisorClient::new(&config).unwrap()
}

fn las_vegas() -> Location {
    Location::new(36.1699, -115.1398, Some("Las Vegas".to_string())).unwrap()
}

#[tokio::test]
async fn test_zones_follow_location_and_limit() {
    let client = serve(true, 1000).await;
    let catalog = ZoneCatalog::embedded().unwrap();

    let zones = client.find_dark_sky_zones(&las_vegas(), 4).await.unwrap();
    let names: Vec<&str> = zones.iter().map(|z| z.name.as_str()).collect();
    let expected: Vec<String> = catalog
        .find_nearest(&las_vegas(), 4)
        .into_iter()
        .map(|z| z.name)
        .collect();
    assert_eq!(names, expected);

    let everything = client.find_dark_sky_zones(&las_vegas(), 50).await.unwrap();
    assert_eq!(everything.len(), catalog.len());
}

#[tokio::test]
async fn test_recommendations_honour_days_and_zone() {
    let client = serve(true, 1000).await;
    let zone = "Cherry Springs State Park";

    let recs = client
        .stargazing_recommendations(&las_vegas(), 3, Some(zone))
        .await
        .unwrap();
    assert_eq!(recs.len(), 3);

    // Same zone, wider window
    let recs = client
        .stargazing_recommendations(&las_vegas(), 10, Some(zone))
        .await
        .unwrap();
    assert_eq!(recs.len(), 10);
    for rec in &recs {
        assert_eq!(rec.dark_sky_zones[0].name, zone);
        assert_eq!(rec.weather_score(), Some(97.0));
    }
}

#[tokio::test]
async fn test_backend_errors_keep_their_message() {
    let client = serve(true, 1000).await;

    let err = client
        .stargazing_recommendations(&las_vegas(), 7, Some("Atlantis"))
        .await
        .unwrap_err();
    assert!(matches!(err, StargazerError::NotFound { .. }));
    assert!(err.user_message().contains("Atlantis"));

    let err = client
        .stargazing_recommendations(&las_vegas(), 30, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StargazerError::Validation { .. }));
}

#[tokio::test]
async fn test_weather_forecast_round_trip() {
    let client = serve(true, 1000).await;
    let forecasts = client.weather_forecast(36.5054, -117.0794, 5).await.unwrap();
    assert_eq!(forecasts.len(), 5);
    assert_eq!(forecasts[0].weather.wind_direction, "SW");
    assert!(forecasts.windows(2).all(|p| p[0].date < p[1].date));

    let offline = serve(false, 1000).await;
    let err = offline.weather_forecast(36.5, -117.0, 3).await.unwrap_err();
    assert!(matches!(err, StargazerError::Api { .. }));
}

#[tokio::test]
async fn test_rate_limit_round_trip() {
    let client = serve(true, 1).await;
    client.find_dark_sky_zones(&las_vegas(), 5).await.unwrap();

    match client.find_dark_sky_zones(&las_vegas(), 5).await {
        Err(StargazerError::RateLimited { retry_after }) => assert!((1..=60).contains(&retry_after)),
        other => panic!("expected a rate limit error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_gives_generic_message() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = AdvisorClient::new(&ClientConfig {
        api_base_url: format!("http://{addr}"),
        ..ClientConfig::default()
    })
    .unwrap();
    let err = client.find_dark_sky_zones(&las_vegas(), 5).await.unwrap_err();
    assert_eq!(err.user_message(), stargazer::advisor::client::GENERIC_FAILURE);
}

#[tokio::test]
async fn test_session_over_http() {
    let client = serve(true, 1000).await;
    let mut session = AdvisorSession::new(client, 50);

    session.submit(las_vegas());
    session.settle().await;
    assert_eq!(session.view().error(), None);
    assert_eq!(session.view().all_zones().len(), 27);
    assert_eq!(session.view().recommendations().len(), 7);

    session.dispatch(ViewAction::SelectZone(Some("Great Basin National Park".to_string())));
    session.dispatch(ViewAction::SetDays(ForecastWindow::Fourteen));
    session.settle().await;

    let recs = session.view().recommendations();
    assert_eq!(recs.len(), 14);
    assert!(
        recs.iter()
            .all(|r| r.dark_sky_zones[0].name == "Great Basin National Park")
    );
}
