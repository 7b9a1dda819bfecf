//! Error types for the seek engine

use std::time::Duration;

use thiserror::Error;

/// Session-level error type
#[derive(Error, Debug)]
pub enum SeekError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session already started")]
    AlreadyStarted,
}

impl From<toml::de::Error> for SeekError {
    fn from(e: toml::de::Error) -> Self {
        SeekError::Config(e.to_string())
    }
}

/// Failure to pick a target venue. Recoverable: the user retries with a shake.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("{0}")]
    Places(String),

    #[error("Nothing open nearby")]
    NoCandidates,

    #[error("Places lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("Waiting for a position fix")]
    NoOrigin,
}

impl From<PlacesError> for ResolutionError {
    fn from(e: PlacesError) -> Self {
        ResolutionError::Places(e.to_string())
    }
}

/// Places service transport and protocol failures
#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("Places request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Places service returned {status}: {message}")]
    Status { status: String, message: String },
}

/// Position, heading, and gesture source failures
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("Sensor data not ready")]
    NotReady,

    #[error("No position fix available")]
    NoFix,
}

pub type Result<T> = std::result::Result<T, SeekError>;
