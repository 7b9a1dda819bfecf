//! Configuration loading for the seek engine
//!
//! Every field has a default, so an empty (or missing) config file yields a
//! working setup for a Raspberry Pi with a serial GPS on `/dev/serial0`, an
//! LIS3MDL magnetometer on I2C, and a push button on GPIO 23.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::sensors::WatchOptions;

/// Environment variable that overrides `places.api_key`.
pub const API_KEY_ENV: &str = "PLACES_API_KEY";

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SeekConfig {
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default)]
    pub gps: GpsConfig,
    #[serde(default)]
    pub compass: CompassConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

/// Places lookup settings
#[derive(Clone, Debug, Deserialize)]
pub struct PlacesConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Venue category to search for (default: cafe)
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default = "default_true")]
    pub open_now: bool,

    /// Upper bound on a single lookup, in seconds (default: 10)
    #[serde(default = "default_places_timeout")]
    pub timeout_secs: u64,
}

/// Serial GPS settings
#[derive(Clone, Debug, Deserialize)]
pub struct GpsConfig {
    #[serde(default = "default_gps_device")]
    pub device: PathBuf,

    #[serde(default = "default_true")]
    pub high_accuracy: bool,

    /// Minimum movement in meters before a new position is emitted (default: 1.0)
    #[serde(default = "default_distance_interval")]
    pub distance_interval_m: f64,

    /// Fixes with a worse HDOP are dropped in high-accuracy mode (default: 2.0)
    #[serde(default = "default_max_hdop")]
    pub max_hdop: f32,

    #[serde(default = "default_first_fix_timeout")]
    pub first_fix_timeout_secs: u64,
}

/// Magnetometer calibration (hard iron correction).
/// Obtained with the `calibrate` binary: rotate the board 360° and record min/max X,Y values.
#[derive(Clone, Debug, Deserialize)]
pub struct CompassConfig {
    #[serde(default = "default_x_offset")]
    pub x_offset: f64, // (X_min + X_max) / 2

    #[serde(default = "default_y_offset")]
    pub y_offset: f64, // (Y_min + Y_max) / 2

    /// Overall heading correction for this location
    #[serde(default = "default_heading_offset")]
    pub heading_offset: f64,

    #[serde(default = "default_compass_poll")]
    pub poll_interval_ms: u64,
}

/// Push button standing in for the shake gesture
#[derive(Clone, Debug, Deserialize)]
pub struct GestureConfig {
    #[serde(default = "default_gesture_pin")]
    pub pin: u8,

    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    #[serde(default = "default_gesture_poll")]
    pub poll_interval_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NavigationConfig {
    /// Distance in meters under which the target counts as reached (default: 10.0)
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius_m: f64,
}

fn default_true() -> bool {
    true
}
fn default_endpoint() -> String {
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json".to_string()
}
fn default_category() -> String {
    "cafe".to_string()
}
fn default_places_timeout() -> u64 {
    10
}
fn default_gps_device() -> PathBuf {
    PathBuf::from("/dev/serial0")
}
fn default_distance_interval() -> f64 {
    1.0
}
fn default_max_hdop() -> f32 {
    2.0
}
fn default_first_fix_timeout() -> u64 {
    30
}
fn default_x_offset() -> f64 {
    -2776.0
}
fn default_y_offset() -> f64 {
    2556.0
}
fn default_heading_offset() -> f64 {
    88.0
}
fn default_compass_poll() -> u64 {
    100
}
fn default_gesture_pin() -> u8 {
    23
}
fn default_debounce() -> u64 {
    20
}
fn default_gesture_poll() -> u64 {
    20
}
fn default_arrival_radius() -> f64 {
    10.0
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
            category: default_category(),
            open_now: true,
            timeout_secs: default_places_timeout(),
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            device: default_gps_device(),
            high_accuracy: true,
            distance_interval_m: default_distance_interval(),
            max_hdop: default_max_hdop(),
            first_fix_timeout_secs: default_first_fix_timeout(),
        }
    }
}

impl Default for CompassConfig {
    fn default() -> Self {
        Self {
            x_offset: default_x_offset(),
            y_offset: default_y_offset(),
            heading_offset: default_heading_offset(),
            poll_interval_ms: default_compass_poll(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pin: default_gesture_pin(),
            debounce_ms: default_debounce(),
            poll_interval_ms: default_gesture_poll(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            arrival_radius_m: default_arrival_radius(),
        }
    }
}

impl SeekConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides (the API key should not live in a file).
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.is_empty()
        {
            self.places.api_key = key;
        }
    }
}

impl PlacesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GpsConfig {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: self.high_accuracy,
            distance_interval_m: self.distance_interval_m,
        }
    }

    pub fn first_fix_timeout(&self) -> Duration {
        Duration::from_secs(self.first_fix_timeout_secs)
    }
}
