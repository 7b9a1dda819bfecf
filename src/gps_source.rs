//! Position source backed by an NMEA 0183 serial GPS.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use nmea::{Nmea, SentenceType};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, trace, warn};

use crate::config::GpsConfig;
use crate::error::SensorError;
use crate::geo::Coordinate;
use crate::sensors::{PositionSource, Subscription, WatchOptions};

/// Turns NMEA sentences into coordinates, applying the accuracy and
/// minimum-movement filters of a watch.
pub struct NmeaDecoder {
    nmea: Nmea,
    options: WatchOptions,
    max_hdop: f32,
    last_emitted: Option<Coordinate>,
}

impl NmeaDecoder {
    pub fn new(options: WatchOptions, max_hdop: f32) -> Self {
        Self {
            nmea: Nmea::default(),
            options,
            max_hdop,
            last_emitted: None,
        }
    }

    /// Feed one sentence; returns a coordinate when it should be emitted.
    pub fn feed(&mut self, sentence: &str) -> Option<Coordinate> {
        let trimmed = sentence.trim();
        if trimmed.is_empty() {
            return None;
        }

        let kind = match self.nmea.parse(trimmed) {
            Ok(kind) => kind,
            Err(e) => {
                debug!("Skipping sentence '{}': {}", trimmed, e);
                return None;
            }
        };
        if !matches!(kind, SentenceType::GGA | SentenceType::RMC | SentenceType::GLL) {
            return None;
        }

        let (Some(lat), Some(lon)) = (self.nmea.latitude, self.nmea.longitude) else {
            return None;
        };

        if self.options.high_accuracy
            && let Some(hdop) = self.nmea.hdop
            && hdop > self.max_hdop
        {
            debug!("Dropping fix with HDOP {:.2}", hdop);
            return None;
        }

        let coordinate = Coordinate::new(lat, lon);
        if let Some(last) = self.last_emitted
            && last.distance_to(&coordinate) < self.options.distance_interval_m
        {
            trace!("Moved less than {}m", self.options.distance_interval_m);
            return None;
        }

        self.last_emitted = Some(coordinate);
        Some(coordinate)
    }

    pub fn satellites(&self) -> Option<u32> {
        self.nmea.num_of_fix_satellites
    }
}

pub struct NmeaPositionSource {
    device: PathBuf,
    max_hdop: f32,
    first_fix_timeout: Duration,
}

impl NmeaPositionSource {
    pub fn new(config: &GpsConfig) -> Self {
        Self {
            device: config.device.clone(),
            max_hdop: config.max_hdop,
            first_fix_timeout: config.first_fix_timeout(),
        }
    }

    async fn open(&self) -> Result<Lines<BufReader<File>>, SensorError> {
        let file = File::open(&self.device).await?;
        debug!("Opened {}", self.device.display());
        Ok(BufReader::new(file).lines())
    }
}

/// Next line from the device. Garbled bytes on a serial line are skipped;
/// `None` means the device is gone or the file ended.
async fn next_sentence<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    loop {
        match lines.next_line().await {
            Ok(line) => return line,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                trace!("Skipping undecodable line: {}", e);
            }
            Err(e) => {
                warn!("Error reading GPS: {}", e);
                return None;
            }
        }
    }
}

#[async_trait]
impl PositionSource for NmeaPositionSource {
    async fn current_position(&self, options: WatchOptions) -> Result<Coordinate, SensorError> {
        let mut lines = self.open().await?;
        let mut decoder = NmeaDecoder::new(
            WatchOptions {
                distance_interval_m: 0.0,
                ..options
            },
            self.max_hdop,
        );

        let read = async {
            while let Some(line) = next_sentence(&mut lines).await {
                if let Some(coordinate) = decoder.feed(&line) {
                    return Ok(coordinate);
                }
            }
            Err(SensorError::NoFix)
        };

        tokio::time::timeout(self.first_fix_timeout, read)
            .await
            .map_err(|_| SensorError::NoFix)?
    }

    async fn watch_positions(
        &self,
        options: WatchOptions,
    ) -> Result<Subscription<Coordinate>, SensorError> {
        let lines = self.open().await?;
        let (tx, rx) = mpsc::channel(16);
        pump(lines, NmeaDecoder::new(options, self.max_hdop), tx);
        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Decode sentences into `tx` until the device ends or the subscriber goes
/// away. A stationary receiver emits nothing, so a dropped subscriber is
/// noticed through `closed()` rather than a failed send.
fn pump<R>(
    mut lines: Lines<R>,
    mut decoder: NmeaDecoder,
    tx: mpsc::Sender<Coordinate>,
) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let line = tokio::select! {
                _ = tx.closed() => {
                    debug!("GPS watch unsubscribed");
                    break;
                }
                line = next_sentence(&mut lines) => line,
            };
            let Some(line) = line else {
                break;
            };

            if let Some(coordinate) = decoder.feed(&line) {
                trace!("Fix {} ({:?} satellites)", coordinate, decoder.satellites());
                if tx.send(coordinate).await.is_err() {
                    break;
                }
            }
        }
        info!("GPS watch ended");
    })
}
