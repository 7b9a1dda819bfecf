//! Navigation state machine.
//!
//! ```text
//! AwaitingPermission ──denied──▶ Blocked
//!        │ granted
//!        ▼
//! AwaitingFirstFix ──target resolved──▶ Seeking ──< radius──▶ Arrived
//!                                          ▲                    │
//!                                          └──── Resolving ◀── shake
//! ```
//!
//! A failed resolution leaves the machine where it was (`AwaitingFirstFix`),
//! or in `Idle` when it followed a shake. Only a shake retries. When no fix
//! was available at start, the first watched position starts the search.
//!
//! Transitions mutate the single owned [`NavigationState`] and hand back the
//! side effects to run afterwards as an ordered list of [`Effect`]s.

use std::fmt;

use tracing::{debug, info};

use crate::error::ResolutionError;
use crate::geo::Coordinate;
use crate::model::{Fix, NavSample, Venue};
use crate::resolver::Selection;

pub const INITIAL_PROMPT: &str = "Coffee. Now.";
pub const SEEKING_NEAREST_MESSAGE: &str = "Coffee.\n Now.";
pub const SEEKING_RANDOM_MESSAGE: &str = "Oh, you crazy.";
pub const ARRIVED_MESSAGE: &str = "Enjoy!";
pub const PERMISSION_DENIED_MESSAGE: &str = "Can't do anything without location permissions";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    AwaitingPermission,
    AwaitingFirstFix,
    /// A shake-triggered resolution is in flight.
    Resolving,
    Seeking,
    Arrived,
    /// Located, but the last shake-triggered resolution failed.
    Idle,
    /// Permission denied. Terminal for the session.
    Blocked,
}

/// Follow-up work produced by a transition, run in order by the session.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Fire the success notification.
    Feedback,
    /// Look up a new target. `origin` is the last known coordinate, if any.
    Resolve {
        seek: u64,
        selection: Selection,
        origin: Option<Coordinate>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct NavigationState {
    target: Option<Venue>,
    last_fix: Fix,
    last_sample: Option<NavSample>,
    status_message: Option<String>,
    phase: Phase,
    seek: u64,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationState {
    pub fn new() -> Self {
        Self {
            target: None,
            last_fix: Fix::default(),
            last_sample: None,
            status_message: Some(INITIAL_PROMPT.to_string()),
            phase: Phase::AwaitingPermission,
            seek: 0,
        }
    }

    pub fn target(&self) -> Option<&Venue> {
        self.target.as_ref()
    }

    pub fn last_fix(&self) -> Fix {
        self.last_fix
    }

    pub fn last_sample(&self) -> Option<NavSample> {
        self.last_sample
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Generation of the most recent resolution request.
    pub fn seek(&self) -> u64 {
        self.seek
    }

    pub fn grant_permission(&mut self) {
        if self.phase == Phase::AwaitingPermission {
            info!("Location permission granted");
            self.phase = Phase::AwaitingFirstFix;
        }
    }

    pub fn block(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("Session blocked: {}", message);
        self.status_message = Some(message);
        self.phase = Phase::Blocked;
    }

    /// Surface a message without changing phase or target.
    pub fn report(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn record_position(&mut self, coordinate: Coordinate) {
        self.last_fix.coordinate = Some(coordinate);
    }

    pub fn record_heading(&mut self, heading_degrees: f64) {
        self.last_fix.heading_degrees = Some(heading_degrees);
    }

    pub fn record_sample(&mut self, sample: NavSample) {
        self.last_sample = Some(sample);
    }

    /// Start a resolution and return its generation. Results carrying an older
    /// generation are discarded by [`NavigationState::apply_resolution`].
    pub fn begin_seek(&mut self, selection: Selection) -> u64 {
        self.seek += 1;
        let message = match selection {
            Selection::Nearest => SEEKING_NEAREST_MESSAGE,
            Selection::Random => {
                self.phase = Phase::Resolving;
                SEEKING_RANDOM_MESSAGE
            }
        };
        self.status_message = Some(message.to_string());
        self.seek
    }

    /// Position recorded while no search has ever run (the first fix timed
    /// out at start): look for the nearest target from here.
    pub fn first_seek(&mut self) -> Vec<Effect> {
        let Some(origin) = self.last_fix.coordinate else {
            return Vec::new();
        };
        if self.phase != Phase::AwaitingFirstFix || self.seek != 0 {
            return Vec::new();
        }

        let seek = self.begin_seek(Selection::Nearest);
        vec![Effect::Resolve {
            seek,
            selection: Selection::Nearest,
            origin: Some(origin),
        }]
    }

    /// Apply a resolution outcome. Returns true when a new target was accepted.
    pub fn apply_resolution(
        &mut self,
        seek: u64,
        result: Result<Venue, ResolutionError>,
    ) -> bool {
        if seek != self.seek {
            debug!("Discarding resolution #{} (current is #{})", seek, self.seek);
            return false;
        }

        match result {
            Ok(venue) => {
                info!("Seeking {}", venue);
                self.target = Some(venue);
                self.last_sample = None;
                self.status_message = None;
                self.phase = Phase::Seeking;
                true
            }
            Err(e) => {
                info!("Resolution failed: {}", e);
                self.status_message = Some(e.to_string());
                // A prior target (if any) stays; only a target-less session changes phase.
                if self.target.is_none() && self.phase == Phase::Resolving {
                    self.phase = Phase::Idle;
                }
                false
            }
        }
    }

    /// Target reached: clear it and notify.
    pub fn arrive(&mut self) -> Vec<Effect> {
        let Some(venue) = self.target.take() else {
            return Vec::new();
        };
        info!("Arrived at {}", venue.name);
        self.status_message = Some(ARRIVED_MESSAGE.to_string());
        self.phase = Phase::Arrived;
        vec![Effect::Feedback]
    }

    /// Shake: drop the current target and look for a random one from here.
    pub fn shake(&mut self) -> Vec<Effect> {
        if matches!(self.phase, Phase::Blocked | Phase::AwaitingPermission) {
            debug!("Ignoring shake in {:?}", self.phase);
            return Vec::new();
        }

        self.target = None;
        self.last_sample = None;
        let seek = self.begin_seek(Selection::Random);

        vec![
            Effect::Feedback,
            Effect::Resolve {
                seek,
                selection: Selection::Random,
                origin: self.last_fix.coordinate,
            },
        ]
    }
}

/// Renders what a display should show: the status message alone when one is
/// set, otherwise the target with its distance and pointer.
impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.status_message {
            return write!(f, "{}", message);
        }

        match (&self.target, &self.last_sample) {
            (Some(target), Some(sample)) => {
                let direction = sample.direction();
                write!(
                    f,
                    "{} · {}m · {} {} ({:.0}°)",
                    target.name.to_uppercase(),
                    sample.distance_meters.floor(),
                    direction.arrow(),
                    direction,
                    sample.normalized_bearing()
                )
            }
            (Some(target), None) => write!(f, "{}", target.name.to_uppercase()),
            _ => Ok(()),
        }
    }
}
