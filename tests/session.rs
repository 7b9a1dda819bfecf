use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use seek_rs::config::PlacesConfig;
use seek_rs::error::PlacesError;
use seek_rs::resolver::{PlacesQuery, PlacesService};
use seek_rs::sensors::{
    FeedbackSink, Gesture, GestureDetector, HeadingSource, PermissionGate, PositionSource,
    Subscription, WatchOptions,
};
use seek_rs::state::{ARRIVED_MESSAGE, PERMISSION_DENIED_MESSAGE};
use seek_rs::{
    Collaborators, Coordinate, NavigationState, Phase, SeekError, SensorError, SessionController,
    TargetResolver, TrackingLoop, Venue,
};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;

struct Gate(bool);

#[async_trait]
impl PermissionGate for Gate {
    async fn request(&self) -> bool {
        self.0
    }
}

struct FakePositions {
    /// `None` simulates a cold start: one-shot reads time out.
    start: Option<Coordinate>,
    reads: Arc<AtomicUsize>,
    stream: Mutex<Option<mpsc::Receiver<Coordinate>>>,
}

#[async_trait]
impl PositionSource for FakePositions {
    async fn current_position(&self, _options: WatchOptions) -> Result<Coordinate, SensorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.start.ok_or(SensorError::NoFix)
    }

    async fn watch_positions(
        &self,
        _options: WatchOptions,
    ) -> Result<Subscription<Coordinate>, SensorError> {
        let rx = self.stream.lock().unwrap().take().ok_or(SensorError::NoFix)?;
        Ok(ReceiverStream::new(rx).boxed())
    }
}

struct FakeHeadings {
    stream: Mutex<Option<mpsc::Receiver<f64>>>,
}

#[async_trait]
impl HeadingSource for FakeHeadings {
    async fn watch_heading(&self) -> Result<Subscription<f64>, SensorError> {
        let rx = self
            .stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| SensorError::Unavailable("taken".into()))?;
        Ok(ReceiverStream::new(rx).boxed())
    }
}

struct FakeGestures {
    stream: Option<mpsc::Receiver<Gesture>>,
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl GestureDetector for FakeGestures {
    async fn start(&mut self) -> Result<Subscription<Gesture>, SensorError> {
        let rx = self
            .stream
            .take()
            .ok_or_else(|| SensorError::Unavailable("taken".into()))?;
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

struct ScriptedPlaces {
    responses: Mutex<VecDeque<Result<Vec<Venue>, PlacesError>>>,
    queries: Arc<Mutex<Vec<PlacesQuery>>>,
}

#[async_trait]
impl PlacesService for ScriptedPlaces {
    async fn nearby_search(&self, query: &PlacesQuery) -> Result<Vec<Venue>, PlacesError> {
        self.queries.lock().unwrap().push(query.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct CountingFeedback(Arc<AtomicUsize>);

impl FeedbackSink for CountingFeedback {
    fn success(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    session: SessionController,
    updates: watch::Receiver<NavigationState>,
    positions: mpsc::Sender<Coordinate>,
    headings: mpsc::Sender<f64>,
    gestures: mpsc::Sender<Gesture>,
    position_reads: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<PlacesQuery>>>,
    feedback: Arc<AtomicUsize>,
    gestures_stopped: Arc<AtomicBool>,
}

fn harness(
    granted: bool,
    start: Coordinate,
    responses: Vec<Result<Vec<Venue>, PlacesError>>,
) -> Harness {
    build(granted, Some(start), responses)
}

fn cold_start_harness(responses: Vec<Result<Vec<Venue>, PlacesError>>) -> Harness {
    build(true, None, responses)
}

fn build(
    granted: bool,
    start: Option<Coordinate>,
    responses: Vec<Result<Vec<Venue>, PlacesError>>,
) -> Harness {
    let (positions, position_rx) = mpsc::channel(16);
    let (headings, heading_rx) = mpsc::channel(16);
    let (gestures, gesture_rx) = mpsc::channel(16);
    let position_reads = Arc::new(AtomicUsize::new(0));
    let queries = Arc::new(Mutex::new(Vec::new()));
    let feedback = Arc::new(AtomicUsize::new(0));
    let gestures_stopped = Arc::new(AtomicBool::new(false));

    let places = ScriptedPlaces {
        responses: Mutex::new(responses.into()),
        queries: Arc::clone(&queries),
    };
    let resolver = TargetResolver::new(Arc::new(places), &PlacesConfig::default());

    let collaborators = Collaborators {
        permission: Box::new(Gate(granted)),
        positions: Arc::new(FakePositions {
            start,
            reads: Arc::clone(&position_reads),
            stream: Mutex::new(Some(position_rx)),
        }),
        headings: Box::new(FakeHeadings {
            stream: Mutex::new(Some(heading_rx)),
        }),
        gestures: Box::new(FakeGestures {
            stream: Some(gesture_rx),
            stopped: Arc::clone(&gestures_stopped),
        }),
        feedback: Arc::new(CountingFeedback(Arc::clone(&feedback))),
    };

    let session = SessionController::new(
        resolver,
        TrackingLoop::new(10.0),
        WatchOptions::default(),
        collaborators,
    );
    let updates = session.subscribe();

    Harness {
        session,
        updates,
        positions,
        headings,
        gestures,
        position_reads,
        queries,
        feedback,
        gestures_stopped,
    }
}

async fn wait_until(
    updates: &mut watch::Receiver<NavigationState>,
    condition: impl FnMut(&NavigationState) -> bool,
) -> NavigationState {
    tokio::time::timeout(Duration::from_secs(2), updates.wait_for(condition))
        .await
        .expect("timed out waiting for state")
        .expect("session dropped")
        .clone()
}

fn venue(name: &str, latitude: f64, longitude: f64) -> Venue {
    Venue::new(name, Coordinate::new(latitude, longitude))
}

#[tokio::test]
async fn permission_denied_blocks_without_lookups() {
    let mut h = harness(false, Coordinate::new(0.0, 0.0), vec![]);

    let err = h.session.start().await.unwrap_err();
    assert!(matches!(err, SeekError::PermissionDenied));

    let state = h.session.snapshot();
    assert_eq!(state.phase(), Phase::Blocked);
    assert_eq!(state.status_message(), Some(PERMISSION_DENIED_MESSAGE));
    assert_eq!(h.position_reads.load(Ordering::SeqCst), 0);
    assert!(h.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn start_seeks_nearest_cafe() {
    let origin = Coordinate::new(37.775, -122.42);
    let mut h = harness(
        true,
        origin,
        vec![Ok(vec![
            venue("Near", 37.776, -122.42),
            venue("Far", 37.785, -122.42),
        ])],
    );

    h.session.start().await.unwrap();

    let state = h.session.snapshot();
    assert_eq!(state.phase(), Phase::Seeking);
    assert_eq!(state.target().unwrap().name, "Near");
    assert!(state.status_message().is_none());
    assert!(state.last_sample().unwrap().distance_meters > 100.0);

    let queries = h.queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].origin, origin);
    assert_eq!(queries[0].category, "cafe");
    assert_eq!(h.position_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn facing_east_toward_target_one_degree_east() {
    let mut h = harness(
        true,
        Coordinate::new(0.0, 0.0),
        vec![Ok(vec![venue("East", 0.0, 1.0)])],
    );
    h.session.start().await.unwrap();

    h.headings.send(90.0).await.unwrap();
    let state = wait_until(&mut h.updates, |s| s.last_fix().heading_degrees == Some(90.0)).await;

    let sample = state.last_sample().unwrap();
    assert!(sample.relative_bearing_degrees.abs() < 1e-6);
    assert!((sample.distance_meters - 111_195.0).abs() < 50.0);
}

#[tokio::test]
async fn arriving_within_radius_completes_once() {
    let mut h = harness(
        true,
        Coordinate::new(48.0, -123.0),
        vec![Ok(vec![venue("Target", 48.002, -123.0)])],
    );
    h.session.start().await.unwrap();
    assert_eq!(h.session.snapshot().phase(), Phase::Seeking);

    // ~5m south of the target.
    h.positions
        .send(Coordinate::new(48.002 - 0.000045, -123.0))
        .await
        .unwrap();
    let state = wait_until(&mut h.updates, |s| s.phase() == Phase::Arrived).await;

    assert!(state.target().is_none());
    assert_eq!(state.status_message(), Some(ARRIVED_MESSAGE));
    assert_eq!(h.feedback.load(Ordering::SeqCst), 1);

    // Still standing there: nothing more fires.
    let here = Coordinate::new(48.002, -123.0);
    h.positions.send(here).await.unwrap();
    h.headings.send(45.0).await.unwrap();
    wait_until(&mut h.updates, |s| {
        s.last_fix().coordinate == Some(here) && s.last_fix().heading_degrees == Some(45.0)
    })
    .await;
    assert_eq!(h.feedback.load(Ordering::SeqCst), 1);
    assert_eq!(h.session.snapshot().phase(), Phase::Arrived);
}

#[tokio::test]
async fn shake_reseeks_randomly_from_current_position() {
    let mut h = harness(
        true,
        Coordinate::new(51.5, -0.12),
        vec![
            Ok(vec![venue("First", 51.51, -0.12)]),
            Ok(vec![venue("Second", 51.49, -0.12), venue("Third", 51.48, -0.12)]),
        ],
    );
    h.session.start().await.unwrap();

    let moved = Coordinate::new(51.502, -0.121);
    h.positions.send(moved).await.unwrap();
    wait_until(&mut h.updates, |s| s.last_fix().coordinate == Some(moved)).await;

    h.gestures.send(Gesture::Shake).await.unwrap();
    let state = wait_until(&mut h.updates, |s| {
        s.phase() == Phase::Seeking && s.target().is_some_and(|t| t.name != "First")
    })
    .await;

    let name = &state.target().unwrap().name;
    assert!(name == "Second" || name == "Third");
    assert!(state.status_message().is_none());
    assert_eq!(h.feedback.load(Ordering::SeqCst), 1);

    let queries = h.queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].origin, moved);
}

#[tokio::test]
async fn failed_first_lookup_waits_for_shake() {
    let mut h = harness(
        true,
        Coordinate::new(40.0, -74.0),
        vec![
            Err(PlacesError::Status {
                status: "OVER_QUERY_LIMIT".into(),
                message: "You have exceeded your daily request quota.".into(),
            }),
            Ok(vec![venue("Retry", 40.001, -74.0)]),
        ],
    );
    h.session.start().await.unwrap();

    let state = h.session.snapshot();
    assert_eq!(state.phase(), Phase::AwaitingFirstFix);
    assert!(state.target().is_none());
    assert!(state.status_message().unwrap().contains("daily request quota"));

    h.gestures.send(Gesture::Shake).await.unwrap();
    let state = wait_until(&mut h.updates, |s| s.phase() == Phase::Seeking).await;
    assert_eq!(state.target().unwrap().name, "Retry");
}

#[tokio::test]
async fn no_candidates_is_reported() {
    let mut h = harness(true, Coordinate::new(0.0, 0.0), vec![Ok(vec![])]);
    h.session.start().await.unwrap();

    let state = h.session.snapshot();
    assert_eq!(state.phase(), Phase::AwaitingFirstFix);
    assert_eq!(state.status_message(), Some("Nothing open nearby"));
}

#[tokio::test]
async fn missing_first_fix_seeks_from_first_watched_position() {
    let mut h = cold_start_harness(vec![Ok(vec![venue("Corner", 52.521, 13.405)])]);

    h.session.start().await.unwrap();

    let state = h.session.snapshot();
    assert_eq!(state.phase(), Phase::AwaitingFirstFix);
    assert_eq!(state.status_message(), Some("No position fix available"));
    assert!(h.queries.lock().unwrap().is_empty());

    let here = Coordinate::new(52.52, 13.405);
    h.positions.send(here).await.unwrap();
    let state = wait_until(&mut h.updates, |s| s.phase() == Phase::Seeking).await;

    assert_eq!(state.target().unwrap().name, "Corner");
    assert!(state.last_sample().is_some());
    let queries = h.queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].origin, here);
}

#[tokio::test]
async fn shake_without_any_fix_reports_waiting() {
    let mut h = cold_start_harness(vec![Ok(vec![venue("Unreached", 0.0, 0.0)])]);
    h.session.start().await.unwrap();

    h.gestures.send(Gesture::Shake).await.unwrap();
    let state = wait_until(&mut h.updates, |s| s.phase() == Phase::Idle).await;

    assert_eq!(state.status_message(), Some("Waiting for a position fix"));
    assert!(state.target().is_none());
    assert_eq!(h.feedback.load(Ordering::SeqCst), 1);
    // The start read and the shake's one-shot read, both without a fix.
    assert_eq!(h.position_reads.load(Ordering::SeqCst), 2);
    assert!(h.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stop_releases_gestures_only() {
    let mut h = harness(
        true,
        Coordinate::new(10.0, 10.0),
        vec![Ok(vec![venue("Cafe", 10.01, 10.0)])],
    );
    h.session.start().await.unwrap();

    h.session.stop().await;
    assert!(h.gestures_stopped.load(Ordering::SeqCst));
    assert!(h.gestures.send(Gesture::Shake).await.is_err());

    let moved = Coordinate::new(10.001, 10.0);
    h.positions.send(moved).await.unwrap();
    let state = wait_until(&mut h.updates, |s| s.last_fix().coordinate == Some(moved)).await;
    assert_eq!(state.phase(), Phase::Seeking);
}

#[tokio::test]
async fn shutdown_unsubscribes_sensors() {
    let mut h = harness(
        true,
        Coordinate::new(10.0, 10.0),
        vec![Ok(vec![venue("Cafe", 10.01, 10.0)])],
    );
    h.session.start().await.unwrap();

    h.session.shutdown().await;
    assert!(h.positions.send(Coordinate::new(10.0, 10.0)).await.is_err());
    assert!(h.headings.send(0.0).await.is_err());
    assert!(h.gestures.send(Gesture::Shake).await.is_err());
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let mut h = harness(
        true,
        Coordinate::new(10.0, 10.0),
        vec![Ok(vec![venue("Cafe", 10.01, 10.0)])],
    );
    h.session.start().await.unwrap();

    assert!(matches!(
        h.session.start().await,
        Err(SeekError::AlreadyStarted)
    ));
}
