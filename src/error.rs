//! Error types and handling for the Stargazer service and advisor

use thiserror::Error;

/// Main error type for Stargazer
#[derive(Error, Debug)]
pub enum StargazerError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream or backend API errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Too many requests; the caller may retry after the given delay
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// A requested resource (zone, place) does not exist
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Device position could not be obtained
    #[error(transparent)]
    Geolocation(#[from] crate::location_resolver::GeolocationError),

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StargazerError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            StargazerError::Config { .. } => {
                "Configuration error. Please check your config file and environment.".to_string()
            }
            StargazerError::Api { message } => message.clone(),
            StargazerError::RateLimited { retry_after } => {
                format!("Too many requests. Please wait {retry_after} seconds and try again.")
            }
            StargazerError::Validation { message } => message.clone(),
            StargazerError::NotFound { message } => message.clone(),
            StargazerError::Geolocation(err) => err.to_string(),
            StargazerError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            StargazerError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

impl From<anyhow::Error> for StargazerError {
    fn from(err: anyhow::Error) -> Self {
        StargazerError::api(format!("{err:#}"))
    }
}
