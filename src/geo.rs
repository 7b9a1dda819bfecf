use std::fmt;

use serde::{Deserialize, Serialize};

/// Earth's radius in meters.
pub const EARTH_RADIUS: f64 = 6371000.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}°, {:.6}°)", self.latitude, self.longitude)
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        bearing(self, other)
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance(self, other)
    }

    /// Project a coordinate forward by a given distance and bearing.
    /// bearing: degrees (0-360, where 0 is North)
    /// distance: meters
    pub fn project(&self, bearing: f64, distance: f64) -> Coordinate {
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let brng = bearing.to_radians();
        let angular_distance = distance / EARTH_RADIUS;

        let lat2 = (lat1.sin() * angular_distance.cos()
            + lat1.cos() * angular_distance.sin() * brng.cos())
        .asin();

        let lon2 = lon1
            + (brng.sin() * angular_distance.sin() * lat1.cos())
                .atan2(angular_distance.cos() - lat1.sin() * lat2.sin());

        // Normalize longitude to -180..180
        let lon2_normalized = (lon2.to_degrees() + 540.0) % 360.0 - 180.0;

        Coordinate::new(lat2.to_degrees(), lon2_normalized)
    }
}

/// Initial great-circle bearing from `from` to `to`.
/// Returns degrees in [0, 360), where 0 is North.
pub fn bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat_from = from.latitude.to_radians();
    let lat_to = to.latitude.to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let y = delta_lon.sin() * lat_to.cos();
    let x = lat_from.cos() * lat_to.sin() - lat_from.sin() * lat_to.cos() * delta_lon.cos();

    let degrees = (y.atan2(x).to_degrees() + 360.0) % 360.0;

    // -0.0 and values a hair under 360 after the modulo both belong at 0.
    if degrees >= 360.0 || degrees == 0.0 {
        0.0
    } else {
        degrees
    }
}

/// Great-circle distance using the Haversine formula.
/// Read more here: https://en.wikipedia.org/wiki/Haversine_formula
/// Returns the distance in meters.
pub fn distance(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat_from = from.latitude.to_radians();
    let lat_to = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat_from.cos() * lat_to.cos() * (delta_lon / 2.0).sin().powi(2);

    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS * c
}
