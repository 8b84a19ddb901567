//! Map deep links for driving to a dark-sky zone

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::location_resolver::{DeviceLocator, GeolocationError, PositionProvider};
use crate::models::Location;

static APPLE_USER_AGENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)iphone|ipad|ipod|macintosh").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapProvider {
    Apple,
    Google,
}

impl MapProvider {
    /// Apple Maps on Apple devices, Google Maps elsewhere
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        if APPLE_USER_AGENT.is_match(user_agent) {
            MapProvider::Apple
        } else {
            MapProvider::Google
        }
    }

    /// Link to `destination`, routed from `origin` when one is known
    #[must_use]
    pub fn url(&self, destination: &Location, origin: Option<&Location>) -> String {
        let to = coordinates(destination);
        match (self, origin) {
            (MapProvider::Apple, Some(origin)) => {
                format!("https://maps.apple.com/?saddr={}&daddr={to}", coordinates(origin))
            }
            (MapProvider::Apple, None) => format!("https://maps.apple.com/?daddr={to}"),
            (MapProvider::Google, Some(origin)) => {
                format!("https://www.google.com/maps/dir/{}/{to}", coordinates(origin))
            }
            (MapProvider::Google, None) => format!("https://www.google.com/maps/place/{to}"),
        }
    }
}

fn coordinates(location: &Location) -> String {
    format!("{},{}", location.latitude(), location.longitude())
}

/// A map link plus the reason routing was skipped, if it was
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLink {
    pub url: String,
    pub routed: bool,
    pub notice: Option<String>,
}

/// Build a directions link from the device position, or a destination-only
/// link when the position cannot be obtained.
pub async fn directions<P: PositionProvider>(
    provider: MapProvider,
    locator: &DeviceLocator<P>,
    destination: &Location,
) -> MapLink {
    match locator.locate().await {
        Ok(origin) => MapLink {
            url: provider.url(destination, Some(&origin)),
            routed: true,
            notice: None,
        },
        Err(error) => {
            info!("Opening map without route: {error:?}");
            MapLink {
                url: provider.url(destination, None),
                routed: false,
                notice: Some(fallback_notice(error)),
            }
        }
    }
}

fn fallback_notice(error: GeolocationError) -> String {
    match error {
        GeolocationError::PermissionDenied => {
            "Location access denied. Showing the destination without directions.".to_string()
        }
        GeolocationError::PositionUnavailable => {
            "Your position is unavailable. Showing the destination without directions.".to_string()
        }
        GeolocationError::Timeout => {
            "Getting your position timed out. Showing the destination without directions.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location_resolver::{DeviceClass, Position, PositionOptions};
    use async_trait::async_trait;
    use chrono::Utc;
    use rstest::rstest;

    struct FixedProvider(std::result::Result<Position, GeolocationError>);

    #[async_trait]
    impl PositionProvider for FixedProvider {
        async fn current_position(&self, _options: &PositionOptions) -> std::result::Result<Position, GeolocationError> {
            self.0
        }
    }

    fn death_valley() -> Location {
        Location::new(36.5054, -117.0794, Some("Death Valley National Park".to_string())).unwrap()
    }

    fn home() -> Location {
        Location::new(37.7749, -122.4194, None).unwrap()
    }

    #[rstest]
    #[case(MapProvider::Apple, true, "https://maps.apple.com/?saddr=37.7749,-122.4194&daddr=36.5054,-117.0794")]
    #[case(MapProvider::Apple, false, "https://maps.apple.com/?daddr=36.5054,-117.0794")]
    #[case(MapProvider::Google, true, "https://www.google.com/maps/dir/37.7749,-122.4194/36.5054,-117.0794")]
    #[case(MapProvider::Google, false, "https://www.google.com/maps/place/36.5054,-117.0794")]
    fn test_urls(#[case] provider: MapProvider, #[case] with_origin: bool, #[case] expected: &str) {
        let origin = home();
        let url = provider.url(&death_valley(), with_origin.then_some(&origin));
        assert_eq!(url, expected);
    }

    #[rstest]
    #[case("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)", MapProvider::Apple)]
    #[case("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)", MapProvider::Apple)]
    #[case("Mozilla/5.0 (Linux; Android 14; Pixel 8)", MapProvider::Google)]
    fn test_provider_from_user_agent(#[case] user_agent: &str, #[case] expected: MapProvider) {
        assert_eq!(MapProvider::from_user_agent(user_agent), expected);
    }

    #[tokio::test]
    async fn test_denied_geolocation_falls_back_to_destination_only() {
        let locator = DeviceLocator::new(
            FixedProvider(Err(GeolocationError::PermissionDenied)),
            DeviceClass::Mobile,
        );
        let link = directions(MapProvider::Google, &locator, &death_valley()).await;
        assert!(!link.routed);
        assert_eq!(link.url, "https://www.google.com/maps/place/36.5054,-117.0794");
        assert!(link.notice.unwrap().contains("denied"));
    }

    #[tokio::test]
    async fn test_routed_link_when_position_known() {
        let locator = DeviceLocator::new(
            FixedProvider(Ok(Position {
                latitude: 37.7749,
                longitude: -122.4194,
                accuracy_meters: None,
                timestamp: Utc::now(),
            })),
            DeviceClass::Desktop,
        );
        let link = directions(MapProvider::Apple, &locator, &death_valley()).await;
        assert!(link.routed);
        assert!(link.url.contains("saddr=37.7749,-122.4194"));
        assert_eq!(link.notice, None);
    }
}
