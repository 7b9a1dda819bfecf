//! Fuses the position and heading streams into bearing/distance samples and
//! runs the arrival check.
//!
//! The two streams are independent: each forwards into the session's event
//! queue on its own cadence, with no barrier between them. A sample is
//! computed from whatever the other stream last reported, stale or not.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::compass::normalize_degrees;
use crate::error::SensorError;
use crate::geo::Coordinate;
use crate::model::NavSample;
use crate::sensors::{HeadingSource, PositionSource, Subscription, WatchOptions};
use crate::session::SessionEvent;
use crate::state::{Effect, NavigationState};

#[derive(Clone, Copy, Debug)]
pub struct TrackingLoop {
    arrival_radius_m: f64,
}

impl TrackingLoop {
    pub fn new(arrival_radius_m: f64) -> Self {
        Self { arrival_radius_m }
    }

    /// Position event: always record it, then resample if there is a target.
    pub fn on_position(&self, state: &mut NavigationState, coordinate: Coordinate) -> Vec<Effect> {
        trace!("Position {}", coordinate);
        state.record_position(coordinate);
        self.refresh(state)
    }

    /// Heading event: always record it, then resample if there is a target and
    /// a known position.
    pub fn on_heading(&self, state: &mut NavigationState, heading_degrees: f64) -> Vec<Effect> {
        let heading = normalize_degrees(heading_degrees);
        trace!("Heading {:.1}°", heading);
        state.record_heading(heading);
        self.refresh(state)
    }

    /// Recompute the sample from the last fix and check for arrival.
    /// No-op while there is no target, which also gates repeat arrivals.
    pub fn refresh(&self, state: &mut NavigationState) -> Vec<Effect> {
        let fix = state.last_fix();
        let (Some(target), Some(coordinate)) = (state.target(), fix.coordinate) else {
            return Vec::new();
        };

        let sample = NavSample::compute(&coordinate, fix.heading_or_north(), &target.coordinate);
        debug!(
            "{}: {:.1}m, relative bearing {:.1}° ({})",
            target.name,
            sample.distance_meters,
            sample.relative_bearing_degrees,
            sample.direction().name()
        );
        state.record_sample(sample);

        if sample.distance_meters < self.arrival_radius_m {
            state.arrive()
        } else {
            Vec::new()
        }
    }

    /// Subscribe to both streams, forwarding every event into `events`.
    pub async fn subscribe(
        &self,
        positions: &dyn PositionSource,
        headings: &dyn HeadingSource,
        options: WatchOptions,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<TrackingHandle, SensorError> {
        let position_stream = positions.watch_positions(options).await?;
        let heading_stream = headings.watch_heading().await?;
        debug!("Tracking position and heading");

        Ok(TrackingHandle {
            tasks: vec![
                forward(position_stream, events.clone(), SessionEvent::Position),
                forward(heading_stream, events, SessionEvent::Heading),
            ],
        })
    }
}

/// Pump a subscription into the event queue until either side goes away.
pub(crate) fn forward<T: Send + 'static>(
    mut stream: Subscription<T>,
    events: mpsc::Sender<SessionEvent>,
    wrap: fn(T) -> SessionEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            if events.send(wrap(item)).await.is_err() {
                break;
            }
        }
    })
}

/// Live position + heading subscriptions. Dropping the handle unsubscribes.
pub struct TrackingHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl TrackingHandle {
    /// Unsubscribe both streams and wait until they are released.
    pub async fn unsubscribe(mut self) {
        for task in std::mem::take(&mut self.tasks) {
            task.abort();
            let _ = task.await;
        }
        debug!("Position and heading unsubscribed");
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
