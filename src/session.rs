//! Session orchestration: permission → first fix → first target → tracking,
//! with the shake gesture wired to "seek somewhere else".
//!
//! Once started, every input (position, heading, gesture, resolution result)
//! is queued into one channel and applied by a single event-loop task that
//! owns the [`NavigationState`]. Updates never race; snapshots are published
//! through a `watch` channel for whoever renders them.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ResolutionError, Result, SeekError};
use crate::geo::Coordinate;
use crate::model::Venue;
use crate::resolver::{Selection, TargetResolver};
use crate::sensors::{
    FeedbackSink, Gesture, GestureDetector, HeadingSource, PermissionGate, PositionSource,
    WatchOptions,
};
use crate::state::{Effect, NavigationState, PERMISSION_DENIED_MESSAGE};
use crate::tracking::{TrackingHandle, TrackingLoop, forward};

const EVENT_QUEUE_DEPTH: usize = 64;

/// Everything that can change the navigation state after start-up.
#[derive(Debug)]
pub enum SessionEvent {
    Position(Coordinate),
    Heading(f64),
    Gesture(Gesture),
    Resolved {
        seek: u64,
        result: std::result::Result<Venue, ResolutionError>,
    },
}

/// External collaborators a session drives.
pub struct Collaborators {
    pub permission: Box<dyn PermissionGate>,
    pub positions: Arc<dyn PositionSource>,
    pub headings: Box<dyn HeadingSource>,
    pub gestures: Box<dyn GestureDetector>,
    pub feedback: Arc<dyn FeedbackSink>,
}

pub struct SessionController {
    resolver: Arc<TargetResolver>,
    tracking: TrackingLoop,
    options: WatchOptions,
    collaborators: Collaborators,
    state_tx: watch::Sender<NavigationState>,
    started: bool,
    subscriptions: Option<TrackingHandle>,
    gesture_task: Option<JoinHandle<()>>,
    event_loop: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(
        resolver: TargetResolver,
        tracking: TrackingLoop,
        options: WatchOptions,
        collaborators: Collaborators,
    ) -> Self {
        let (state_tx, _) = watch::channel(NavigationState::new());
        Self {
            resolver: Arc::new(resolver),
            tracking,
            options,
            collaborators,
            state_tx,
            started: false,
            subscriptions: None,
            gesture_task: None,
            event_loop: None,
        }
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<NavigationState> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> NavigationState {
        self.state_tx.borrow().clone()
    }

    fn publish(&self, state: &NavigationState) {
        self.state_tx.send_replace(state.clone());
    }

    /// Check permission, take a first fix, resolve the nearest target, then
    /// start tracking and listening for shakes.
    ///
    /// Neither a missing first fix nor a failed first resolution is an error
    /// here: the message is shown and tracking still starts. A shake retries,
    /// and without a fix the first watched position triggers the search.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(SeekError::AlreadyStarted);
        }
        self.started = true;

        let mut state = NavigationState::new();
        self.publish(&state);

        if !self.collaborators.permission.request().await {
            warn!("Location permission denied");
            state.block(PERMISSION_DENIED_MESSAGE);
            self.publish(&state);
            return Err(SeekError::PermissionDenied);
        }
        state.grant_permission();
        self.publish(&state);

        // Without a first fix the search starts from the first watched position.
        match self.collaborators.positions.current_position(self.options).await {
            Ok(origin) => {
                info!("First fix at {}", origin);
                state.record_position(origin);

                let seek = state.begin_seek(Selection::Nearest);
                self.publish(&state);
                let result = self.resolver.resolve(origin, Selection::Nearest).await;
                let effects = if state.apply_resolution(seek, result) {
                    self.tracking.refresh(&mut state)
                } else {
                    Vec::new()
                };
                for effect in &effects {
                    if *effect == Effect::Feedback {
                        self.collaborators.feedback.success();
                    }
                }
            }
            Err(e) => {
                warn!("No first fix yet: {}", e);
                state.report(e.to_string());
            }
        }
        self.publish(&state);

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let subscriptions = self
            .tracking
            .subscribe(
                self.collaborators.positions.as_ref(),
                self.collaborators.headings.as_ref(),
                self.options,
                events_tx.clone(),
            )
            .await;
        match subscriptions {
            Ok(handle) => self.subscriptions = Some(handle),
            Err(e) => {
                error!("Could not start tracking: {}", e);
                state.report(e.to_string());
                self.publish(&state);
                return Err(e.into());
            }
        }

        match self.collaborators.gestures.start().await {
            Ok(gestures) => {
                self.gesture_task = Some(forward(gestures, events_tx.clone(), SessionEvent::Gesture))
            }
            // Navigation works without shakes; only re-seeking is lost.
            Err(e) => warn!("Gesture detector unavailable: {}", e),
        }

        let event_loop = EventLoop {
            state,
            tracking: self.tracking,
            resolver: Arc::clone(&self.resolver),
            positions: Arc::clone(&self.collaborators.positions),
            feedback: Arc::clone(&self.collaborators.feedback),
            options: self.options,
            state_tx: self.state_tx.clone(),
            events: events_tx,
        };
        self.event_loop = Some(tokio::spawn(event_loop.run(events_rx)));
        info!("Session started");
        Ok(())
    }

    /// Stop listening for gestures. Position and heading keep flowing; use
    /// [`SessionController::shutdown`] to release them too.
    pub async fn stop(&mut self) {
        self.collaborators.gestures.stop().await;
        if let Some(task) = self.gesture_task.take() {
            task.abort();
            let _ = task.await;
        }
        debug!("Gesture detector stopped");
    }

    /// Stop everything: gestures, both sensor subscriptions, and the event loop.
    pub async fn shutdown(&mut self) {
        self.stop().await;
        if let Some(subscriptions) = self.subscriptions.take() {
            subscriptions.unsubscribe().await;
        }
        if let Some(event_loop) = self.event_loop.take() {
            event_loop.abort();
            let _ = event_loop.await;
        }
        info!("Session ended");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(task) = &self.gesture_task {
            task.abort();
        }
        if let Some(task) = &self.event_loop {
            task.abort();
        }
    }
}

/// Sole owner of the state once the session is running.
struct EventLoop {
    state: NavigationState,
    tracking: TrackingLoop,
    resolver: Arc<TargetResolver>,
    positions: Arc<dyn PositionSource>,
    feedback: Arc<dyn FeedbackSink>,
    options: WatchOptions,
    state_tx: watch::Sender<NavigationState>,
    events: mpsc::Sender<SessionEvent>,
}

impl EventLoop {
    async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            let effects = self.apply(event);
            self.execute(effects);
            self.state_tx.send_replace(self.state.clone());
        }
        debug!("Event queue closed");
    }

    fn apply(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::Position(coordinate) => {
                let mut effects = self.tracking.on_position(&mut self.state, coordinate);
                effects.extend(self.state.first_seek());
                effects
            }
            SessionEvent::Heading(heading) => self.tracking.on_heading(&mut self.state, heading),
            SessionEvent::Gesture(Gesture::Shake) => {
                info!("Shake: seeking somewhere else");
                self.state.shake()
            }
            SessionEvent::Resolved { seek, result } => {
                if self.state.apply_resolution(seek, result) {
                    self.tracking.refresh(&mut self.state)
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Feedback => self.feedback.success(),
                Effect::Resolve {
                    seek,
                    selection,
                    origin,
                } => self.spawn_resolution(seek, selection, origin),
            }
        }
    }

    /// Resolve off the loop so sensor events keep flowing meanwhile. The
    /// last known coordinate is the current one; with none yet, ask for a read.
    fn spawn_resolution(&self, seek: u64, selection: Selection, origin: Option<Coordinate>) {
        let resolver = Arc::clone(&self.resolver);
        let positions = Arc::clone(&self.positions);
        let events = self.events.clone();
        let options = self.options;

        tokio::spawn(async move {
            let origin = match origin {
                Some(origin) => Ok(origin),
                None => positions.current_position(options).await,
            };
            let result = match origin {
                Ok(origin) => resolver.resolve(origin, selection).await,
                Err(e) => {
                    warn!("No position to search from: {}", e);
                    Err(ResolutionError::NoOrigin)
                }
            };
            if events.send(SessionEvent::Resolved { seek, result }).await.is_err() {
                debug!("Session ended before resolution #{} finished", seek);
            }
        });
    }
}
