//! Configuration management for Stargazer
//!
//! Handles loading configuration from an optional TOML file and
//! `STARGAZER__SECTION__KEY` environment variables, and validates every
//! setting before the service starts.

use crate::StargazerError;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "STARGAZER_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StargazerConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Weather API settings
    pub weather: WeatherConfig,
    /// Geocoding API settings
    pub geocoding: GeocodingConfig,
    /// Persistent cache settings
    pub cache: CacheConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Zone search and recommendation defaults
    pub search: SearchConfig,
    /// Advisor client settings
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
    /// Requests accepted per minute across all clients
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Base URL of the Open-Meteo forecast API
    pub base_url: String,
    pub timeout_seconds: u32,
    pub max_retries: u32,
    /// How long fetched forecasts stay cached
    pub cache_ttl_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Base URL of the Nominatim API
    pub base_url: String,
    /// Nominatim requires an identifying user agent
    pub user_agent: String,
    pub country_codes: String,
    pub timeout_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache directory location
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Zones returned when the request has no `limit`
    pub default_zone_limit: usize,
    /// Days of recommendations when the request has no `days`
    pub default_days: u32,
    /// Upper bound for `days`
    pub max_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the Stargazer backend
    pub api_base_url: String,
    /// Zones requested per location query; the advisor paginates locally
    pub zone_fetch_limit: usize,
    pub timeout_seconds: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_seconds: 30,
            requests_per_minute: 120,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1".to_string(),
            timeout_seconds: 20,
            max_retries: 3,
            cache_ttl_hours: 3,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: format!("stargazer/{}", crate::VERSION),
            country_codes: "us".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            location: ".cache/stargazer".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_zone_limit: 5,
            default_days: 14,
            max_days: 14,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            zone_fetch_limit: 50,
            timeout_seconds: 30,
        }
    }
}

impl StargazerConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from_path(path)
    }

    /// Load configuration from the specified path, falling back to `stargazer.toml`
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(|| PathBuf::from("stargazer.toml"));

        let mut builder = Config::builder();
        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("STARGAZER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: StargazerConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to deserialize configuration from {}", config_file.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(StargazerError::config("Server port cannot be 0").into());
        }

        if self.server.requests_per_minute == 0 {
            return Err(
                StargazerError::config("Server requests per minute must be at least 1").into(),
            );
        }

        if self.weather.timeout_seconds == 0 || self.weather.timeout_seconds > 300 {
            return Err(StargazerError::config(
                "Weather API timeout must be between 1 and 300 seconds",
            )
            .into());
        }

        if self.weather.max_retries > 10 {
            return Err(StargazerError::config("Weather API max retries cannot exceed 10").into());
        }

        if self.weather.cache_ttl_hours > 48 {
            return Err(StargazerError::config("Weather cache TTL cannot exceed 48 hours").into());
        }

        if self.search.default_zone_limit == 0 {
            return Err(StargazerError::config("Default zone limit must be at least 1").into());
        }

        if self.search.max_days == 0 || self.search.max_days > 16 {
            return Err(StargazerError::config(
                "Maximum forecast days must be between 1 and 16",
            )
            .into());
        }

        if self.search.default_days == 0 || self.search.default_days > self.search.max_days {
            return Err(StargazerError::config(format!(
                "Default days must be between 1 and {}",
                self.search.max_days
            ))
            .into());
        }

        if self.client.zone_fetch_limit == 0 {
            return Err(StargazerError::config("Client zone fetch limit must be at least 1").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(StargazerError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(StargazerError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather API base URL", &self.weather.base_url),
            ("Geocoding base URL", &self.geocoding.base_url),
            ("Client API base URL", &self.client.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(StargazerError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if self.geocoding.user_agent.trim().is_empty() {
            return Err(StargazerError::config("Geocoding user agent cannot be empty").into());
        }

        Ok(())
    }
}
