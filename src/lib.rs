pub mod compass;
pub mod compass_sensor;
pub mod config;
pub mod error;
pub mod feedback;
pub mod geo;
pub mod gps_source;
pub mod gpio_input;
pub mod model;
pub mod permission;
pub mod places;
pub mod resolver;
pub mod sensors;
pub mod session;
pub mod state;
pub mod tracking;

// Re-export commonly used types
pub use config::SeekConfig;
pub use error::{ResolutionError, SeekError, SensorError};
pub use geo::Coordinate;
pub use model::{Fix, NavSample, Venue};
pub use resolver::{Selection, TargetResolver};
pub use session::{Collaborators, SessionController};
pub use state::{NavigationState, Phase};
pub use tracking::TrackingLoop;

#[cfg(test)]
pub(crate) mod mocks;
