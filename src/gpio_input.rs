//! Push-button gesture detector. On the Pi a button wired to a GPIO pin
//! stands in for the phone's shake gesture.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

// Use rppal in production
#[cfg(not(test))]
use rppal::gpio::{Gpio, InputPin, Level};

// This is only used in testing, not compiled in release.
#[cfg(test)]
use crate::mocks::mock_gpio::{Gpio, InputPin, Level};

use crate::config::GestureConfig;
use crate::error::SensorError;
use crate::sensors::{Gesture, GestureDetector, Subscription};

/// Active-low button with a pull-up, debounced in software.
pub struct PushButton {
    pin: InputPin,
    pressed: bool,
    last_edge: Option<Instant>,
    debounce: Duration,
}

impl PushButton {
    pub fn new(pin: u8, debounce: Duration) -> Result<Self, SensorError> {
        let gpio = Gpio::new().map_err(|e| SensorError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(pin)
            .map_err(|e| SensorError::Gpio(e.to_string()))?
            .into_input_pullup();

        Ok(Self {
            pin,
            pressed: false,
            last_edge: None,
            debounce,
        })
    }

    /// Sample the pin. Returns true exactly once per press.
    pub fn poll(&mut self) -> bool {
        let down = self.pin.read() == Level::Low;
        if down == self.pressed {
            return false;
        }

        // Ignore bounces right after the previous edge.
        if let Some(edge) = self.last_edge
            && edge.elapsed() < self.debounce
        {
            return false;
        }

        self.pressed = down;
        self.last_edge = Some(Instant::now());
        down
    }
}

struct Running {
    stop: Arc<AtomicBool>,
    poller: thread::JoinHandle<PushButton>,
}

pub struct ButtonGesture {
    button: Option<PushButton>,
    poll_interval: Duration,
    running: Option<Running>,
}

impl ButtonGesture {
    pub fn new(config: &GestureConfig) -> Result<Self, SensorError> {
        let button = PushButton::new(config.pin, Duration::from_millis(config.debounce_ms))?;
        info!("Shake button on GPIO {}", config.pin);
        Ok(Self::with_button(
            button,
            Duration::from_millis(config.poll_interval_ms),
        ))
    }

    pub fn with_button(button: PushButton, poll_interval: Duration) -> Self {
        Self {
            button: Some(button),
            poll_interval,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

#[async_trait]
impl GestureDetector for ButtonGesture {
    async fn start(&mut self) -> Result<Subscription<Gesture>, SensorError> {
        let mut button = self
            .button
            .take()
            .ok_or_else(|| SensorError::Unavailable("gesture detector already started".to_string()))?;

        let (tx, rx) = mpsc::channel(4);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let poll_interval = self.poll_interval;

        let poller = thread::Builder::new()
            .name("gesture".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    if button.poll() {
                        debug!("Button pressed");
                        match tx.try_send(Gesture::Shake) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => debug!("Dropping press, queue full"),
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                    thread::sleep(poll_interval);
                }
                button
            })?;

        self.running = Some(Running { stop, poller });
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.stop.store(true, Ordering::Relaxed);

        match tokio::task::spawn_blocking(move || running.poller.join()).await {
            Ok(Ok(button)) => self.button = Some(button),
            _ => warn!("Gesture poller did not shut down cleanly"),
        }
    }
}
