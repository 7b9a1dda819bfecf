//! Contracts for the collaborators the engine consumes: permission gate,
//! position and heading sources, gesture detector, and feedback sink.
//!
//! Continuous sources hand back a [`Subscription`]; dropping it unsubscribes,
//! and producers stop once they notice the receiving side is gone.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SensorError;
use crate::geo::Coordinate;

/// A live stream of sensor events. Drop to unsubscribe.
pub type Subscription<T> = BoxStream<'static, T>;

/// Options for position reads and watches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Minimum movement in meters before another position is emitted.
    pub distance_interval_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            distance_interval_m: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Shake,
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Returns true when location access is granted.
    async fn request(&self) -> bool;
}

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Single position read.
    async fn current_position(&self, options: WatchOptions) -> Result<Coordinate, SensorError>;

    async fn watch_positions(
        &self,
        options: WatchOptions,
    ) -> Result<Subscription<Coordinate>, SensorError>;
}

#[async_trait]
pub trait HeadingSource: Send + Sync {
    /// Stream of true headings in degrees.
    async fn watch_heading(&self) -> Result<Subscription<f64>, SensorError>;
}

#[async_trait]
pub trait GestureDetector: Send + Sync {
    async fn start(&mut self) -> Result<Subscription<Gesture>, SensorError>;

    async fn stop(&mut self);
}

/// Fire-and-forget user feedback (haptics, a beep, a log line).
pub trait FeedbackSink: Send + Sync {
    fn success(&self);
}
