use std::fmt;

use crate::compass::{Direction, normalize_degrees};
use crate::geo::Coordinate;

/// A point of interest to seek.
#[derive(Clone, Debug, PartialEq)]
pub struct Venue {
    pub name: String,
    pub coordinate: Coordinate,
}

impl Venue {
    pub fn new(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            name: name.into(),
            coordinate,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.coordinate)
    }
}

/// Most recent fused location + heading.
///
/// Position and heading arrive on independent streams, so either half may be
/// missing (not yet emitted) or older than the other.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Fix {
    pub coordinate: Option<Coordinate>,
    pub heading_degrees: Option<f64>, // [0, 360)
}

impl Fix {
    /// Heading used for bearing calculations; north until the compass reports.
    pub fn heading_or_north(&self) -> f64 {
        self.heading_degrees.unwrap_or(0.0)
    }
}

/// Bearing and distance from the current fix to the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavSample {
    /// Target bearing minus current heading, in (-360, 360). Not wrapped;
    /// see [`NavSample::normalized_bearing`].
    pub relative_bearing_degrees: f64,
    pub distance_meters: f64,
}

impl NavSample {
    pub fn compute(from: &Coordinate, heading_degrees: f64, to: &Coordinate) -> Self {
        Self {
            relative_bearing_degrees: from.bearing_to(to) - heading_degrees,
            distance_meters: from.distance_to(to),
        }
    }

    /// Relative bearing wrapped into [0, 360).
    pub fn normalized_bearing(&self) -> f64 {
        normalize_degrees(self.relative_bearing_degrees)
    }

    pub fn direction(&self) -> Direction {
        Direction::from_degrees(self.relative_bearing_degrees)
    }
}
