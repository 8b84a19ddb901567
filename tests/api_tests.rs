//! Integration tests driving the HTTP API in-process

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Days, Utc};
use serde_json::{Value, json};
use tower::ServiceExt; // for oneshot

use stargazer::ZoneCatalog;
use stargazer::astronomy::local_date;
use stargazer::api::{AppState, create_router};
use stargazer::config::SearchConfig;
use stargazer::models::{DailyForecast, Location, WeatherConditions};
use stargazer::weather::WeatherSource;

struct StubWeather {
    available: bool,
}

#[async_trait]
impl WeatherSource for StubWeather {
    async fn nightly_forecast(&self, location: &Location, days: u32) -> anyhow::Result<Vec<DailyForecast>> {
        if !self.available {
            return Err(anyhow!("upstream unavailable"));
        }
        // Open-Meteo keys nights by the location's own calendar
        let today = local_date(location, Utc::now());
        Ok((0..days)
            .map(|offset| DailyForecast {
                date: today + Days::new(offset.into()),
                weather: WeatherConditions {
                    temperature_f: 52.0,
                    temperature_c: 11.1,
                    humidity: 55.0,
                    cloud_cover: 20.0,
                    visibility_miles: 12.0,
                    wind_speed_mph: 6.0,
                    wind_direction: "W".to_string(),
                    condition: "Mainly Clear".to_string(),
                    condition_description: "Mainly clear".to_string(),
                    weather_score: 90.0,
                    precipitation_chance: 0.0,
                },
            })
            .collect())
    }
}

fn app_with(weather_available: bool, requests_per_minute: u32) -> Router {
    let state = AppState::new(
        ZoneCatalog::embedded().unwrap(),
        Arc::new(StubWeather {
            available: weather_available,
        }),
        SearchConfig::default(),
        requests_per_minute,
    );
    create_router(state)
}

fn app() -> Router {
    app_with(true, 1000)
}

async fn json_response(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&body).expect("Failed to parse JSON")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn san_francisco() -> Value {
    json!({ "latitude": 37.7749, "longitude": -122.4194 })
}

#[tokio::test]
async fn test_root_and_health() {
    let response = app().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_response(response).await;
    assert_eq!(body["message"], "Dark Sky Zone Finder API");
    assert!(body["version"].is_string());

    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_response(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_find_zones_defaults_to_five_closest() {
    let response = app()
        .oneshot(post_json("/find-dark-sky-zones", san_francisco()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_response(response).await;
    let zones = body["dark_sky_zones"].as_array().unwrap();
    assert_eq!(zones.len(), 5);

    let distances: Vec<f64> = zones
        .iter()
        .map(|z| z["distance_miles"].as_f64().unwrap())
        .collect();
    assert!(distances.windows(2).all(|p| p[0] <= p[1]));
    for zone in zones {
        let bortle = zone["bortle_scale"].as_u64().unwrap();
        assert!((1..=9).contains(&bortle));
    }
}

#[tokio::test]
async fn test_find_zones_honours_limit() {
    let response = app()
        .oneshot(post_json("/find-dark-sky-zones?limit=50", san_francisco()))
        .await
        .unwrap();
    let body = json_response(response).await;
    assert_eq!(body["dark_sky_zones"].as_array().unwrap().len(), 27);
}

#[tokio::test]
async fn test_out_of_range_location_rejected() {
    let response = app()
        .oneshot(post_json(
            "/find-dark-sky-zones",
            json!({ "latitude": 123.0, "longitude": 10.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_response(response).await;
    assert!(
        body["detail"]["message"]
            .as_str()
            .unwrap()
            .contains("Latitude must be between -90 and 90")
    );
}

#[tokio::test]
async fn test_malformed_body_uses_detail_envelope() {
    let request = Request::builder()
        .method("POST")
        .uri("/find-dark-sky-zones")
        .header("content-type", "application/json")
        .body(Body::from("{\"latitude\": "))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
    let body = json_response(response).await;
    assert!(body["detail"]["message"].is_string());
}

#[tokio::test]
async fn test_recommendations_with_weather() {
    let response = app()
        .oneshot(post_json("/stargazing-recommendations?days=7", san_francisco()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_response(response).await;
    let recs = body["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 7);

    let scores: Vec<f64> = recs
        .iter()
        .map(|r| r["conditions"]["visibility_score"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|p| p[0] >= p[1]));

    let first = &recs[0];
    assert_eq!(first["conditions"]["bortle_source"], "dark_sky_catalog");
    for rec in recs {
        assert_eq!(rec["conditions"]["weather"]["weather_score"], 90.0);
    }
    assert_eq!(first["dark_sky_zones"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_recommendations_default_to_fourteen_days() {
    let response = app()
        .oneshot(post_json("/stargazing-recommendations", san_francisco()))
        .await
        .unwrap();
    let body = json_response(response).await;
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 14);
}

#[tokio::test]
async fn test_recommendations_scoped_to_zone() {
    let uri = "/stargazing-recommendations?days=3&zone_name=Cherry%20Springs%20State%20Park";
    let response = app().oneshot(post_json(uri, san_francisco())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_response(response).await;
    for rec in body["recommendations"].as_array().unwrap() {
        assert_eq!(rec["dark_sky_zones"][0]["name"], "Cherry Springs State Park");
    }
}

#[tokio::test]
async fn test_unknown_zone_is_404() {
    let uri = "/stargazing-recommendations?zone_name=Atlantis";
    let response = app().oneshot(post_json(uri, san_francisco())).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_response(response).await;
    assert!(body["detail"]["message"].as_str().unwrap().contains("Atlantis"));
}

#[tokio::test]
async fn test_recommendations_survive_weather_outage() {
    let response = app_with(false, 1000)
        .oneshot(post_json("/stargazing-recommendations?days=3", san_francisco()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_response(response).await;
    for rec in body["recommendations"].as_array().unwrap() {
        assert!(rec["conditions"].get("weather").is_none());
    }
}

#[tokio::test]
async fn test_days_out_of_range() {
    let response = app()
        .oneshot(post_json("/stargazing-recommendations?days=30", san_francisco()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_weather_forecast_endpoint() {
    let response = app()
        .oneshot(get("/weather-forecast/36.5054/-117.0794?days=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_response(response).await;
    let forecasts = body["forecasts"].as_array().unwrap();
    assert_eq!(forecasts.len(), 3);
    assert!(forecasts[0]["date"].is_string());
    assert_eq!(forecasts[0]["weather"]["wind_direction"], "W");
}

#[tokio::test]
async fn test_weather_forecast_outage_is_bad_gateway() {
    let response = app_with(false, 1000)
        .oneshot(get("/weather-forecast/36.5/-117.0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_response(response).await;
    assert!(body["detail"]["message"].is_string());
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let app = app_with(true, 2);
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/find-dark-sky-zones", san_francisco()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post_json("/find-dark-sky-zones", san_francisco()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_response(response).await;
    let retry_after = body["detail"]["retry_after"].as_u64().unwrap();
    assert!((1..=60).contains(&retry_after));
    assert!(body["detail"]["message"].as_str().unwrap().contains("seconds"));

    // Health checks are not rate limited
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
