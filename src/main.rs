use std::path::Path;
use std::sync::Arc;

use seek_rs::compass_sensor::CompassHeading;
use seek_rs::feedback::LogFeedback;
use seek_rs::gps_source::NmeaPositionSource;
use seek_rs::gpio_input::ButtonGesture;
use seek_rs::permission::DevicePermission;
use seek_rs::places::GooglePlaces;
use seek_rs::{
    Collaborators, SeekConfig, SeekError, SessionController, TargetResolver, TrackingLoop,
};
use tracing::{error, info, warn};

// Usage:
//  seek [config.toml]
//
//  Finds the nearest open café, then points at it:
//  → The arrow shows where to walk relative to where the board is facing
//  ● "Enjoy!" once within the arrival radius
//  ↻ Press the button (our "shake") to be sent somewhere random instead
#[tokio::main]
async fn main() -> Result<(), SeekError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("seek_rs=info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            SeekConfig::load(Path::new(&path))?
        }
        None => SeekConfig::default(),
    };
    config.apply_env();
    if config.places.api_key.is_empty() {
        warn!("No places API key (set PLACES_API_KEY); lookups will be rejected");
    }

    let places = GooglePlaces::new(&config.places).map_err(|e| SeekError::Config(e.to_string()))?;
    let resolver = TargetResolver::new(Arc::new(places), &config.places);

    let collaborators = Collaborators {
        permission: Box::new(DevicePermission::new(config.gps.device.clone())),
        positions: Arc::new(NmeaPositionSource::new(&config.gps)),
        headings: Box::new(CompassHeading::new(&config.compass)?),
        gestures: Box::new(ButtonGesture::new(&config.gesture)?),
        feedback: Arc::new(LogFeedback::new()),
    };

    let mut session = SessionController::new(
        resolver,
        TrackingLoop::new(config.navigation.arrival_radius_m),
        config.gps.watch_options(),
        collaborators,
    );

    let mut updates = session.subscribe();
    let render = tokio::spawn(async move {
        let mut last = String::new();
        while updates.changed().await.is_ok() {
            let screen = updates.borrow_and_update().to_string();
            if screen != last {
                println!("{}", screen);
                last = screen;
            }
        }
    });

    if let Err(e) = session.start().await {
        error!("{}", e);
        // Let the final message render before exiting.
        session.shutdown().await;
        drop(session);
        let _ = render.await;
        return Err(e);
    }

    tokio::signal::ctrl_c().await?;
    println!();
    session.shutdown().await;
    drop(session);
    let _ = render.await;
    Ok(())
}
