//! Heading source backed by an LIS3MDL magnetometer on the Pi's I2C bus.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use rppal::i2c::I2c;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, trace};

use crate::compass::normalize_degrees;
use crate::config::CompassConfig;
use crate::error::SensorError;
use crate::sensors::{HeadingSource, Subscription};

const LIS3MDL_ADDR: u16 = 0x1C;
const LIS3MDL_ID: u8 = 0x3D;

// LIS3MDL register addresses
const WHO_AM_I: u8 = 0x0F;
const CTRL_REG1: u8 = 0x20;
const CTRL_REG2: u8 = 0x21;
const CTRL_REG3: u8 = 0x22;
const CTRL_REG4: u8 = 0x23;
const CTRL_REG5: u8 = 0x24;
const STATUS_REG: u8 = 0x27;
const OUT_X_L: u8 = 0x28;

/// XYZ data available bit in STATUS_REG.
const STATUS_ZYXDA: u8 = 0x08;

const INIT_SEQUENCE: [(u8, u8); 5] = [
    (CTRL_REG1, 0xFC), // temperature on, ultra-high performance X/Y, 80 Hz
    (CTRL_REG2, 0x00), // ±4 gauss
    (CTRL_REG3, 0x00), // continuous conversion
    (CTRL_REG4, 0x0C), // ultra-high performance Z, little endian
    (CTRL_REG5, 0x40), // block data update
];

/// Hard iron offsets plus a fixed correction for the mounting/location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    pub x_offset: f64,
    pub y_offset: f64,
    pub heading_offset: f64,
}

impl From<&CompassConfig> for Calibration {
    fn from(config: &CompassConfig) -> Self {
        Self {
            x_offset: config.x_offset,
            y_offset: config.y_offset,
            heading_offset: config.heading_offset,
        }
    }
}

/// Heading in [0, 360) from raw magnetometer X/Y counts.
pub fn heading_from_raw(x_raw: f64, y_raw: f64, calibration: &Calibration) -> f64 {
    let x = x_raw - calibration.x_offset;
    let y = y_raw - calibration.y_offset;
    normalize_degrees(y.atan2(x).to_degrees() + calibration.heading_offset)
}

pub struct CompassSensor {
    i2c: I2c,
    calibration: Calibration,
}

impl CompassSensor {
    pub fn new(calibration: Calibration) -> Result<Self, SensorError> {
        let mut i2c = I2c::new()?;
        i2c.set_slave_address(LIS3MDL_ADDR)?;

        let who_am_i = i2c.smbus_read_byte(WHO_AM_I)?;
        if who_am_i != LIS3MDL_ID {
            return Err(SensorError::Unavailable(format!(
                "wrong magnetometer ID 0x{:02X}, expected 0x{:02X}",
                who_am_i, LIS3MDL_ID
            )));
        }

        for (register, value) in INIT_SEQUENCE {
            i2c.smbus_write_byte(register, value)?;
        }
        thread::sleep(Duration::from_millis(100));

        if i2c.smbus_read_byte(STATUS_REG)? == 0 {
            return Err(SensorError::Unavailable(
                "magnetometer not responding (no data ready)".to_string(),
            ));
        }

        info!("Compass (LIS3MDL) initialized");
        Ok(Self { i2c, calibration })
    }

    /// Raw X, Y counts, uncalibrated. Used by the calibration tool.
    pub fn read_raw(&mut self) -> Result<(f64, f64), SensorError> {
        if self.i2c.smbus_read_byte(STATUS_REG)? & STATUS_ZYXDA == 0 {
            return Err(SensorError::NotReady);
        }

        // X and Y, low byte first
        let mut data = [0u8; 4];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = self.i2c.smbus_read_byte(OUT_X_L + i as u8)?;
        }

        let x = i16::from_le_bytes([data[0], data[1]]) as f64;
        let y = i16::from_le_bytes([data[2], data[3]]) as f64;
        Ok((x, y))
    }

    pub fn read_heading(&mut self) -> Result<f64, SensorError> {
        let (x, y) = self.read_raw()?;
        Ok(heading_from_raw(x, y, &self.calibration))
    }
}

/// Polls the compass on its own thread and streams headings.
pub struct CompassHeading {
    sensor: Mutex<Option<CompassSensor>>,
    poll_interval: Duration,
}

impl CompassHeading {
    pub fn new(config: &CompassConfig) -> Result<Self, SensorError> {
        Ok(Self {
            sensor: Mutex::new(Some(CompassSensor::new(Calibration::from(config))?)),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }
}

#[async_trait]
impl HeadingSource for CompassHeading {
    async fn watch_heading(&self) -> Result<Subscription<f64>, SensorError> {
        let mut sensor = self
            .sensor
            .lock()
            .map_err(|_| SensorError::Unavailable("compass lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| SensorError::Unavailable("compass already streaming".to_string()))?;

        let (tx, rx) = mpsc::channel(8);
        let poll_interval = self.poll_interval;

        thread::Builder::new()
            .name("compass".to_string())
            .spawn(move || poll_headings(|| sensor.read_heading(), tx, poll_interval))?;

        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Blocking poll loop. Runs until the subscriber drops the stream, checked on
/// every pass so failing reads cannot keep it alive.
fn poll_headings<F>(mut read: F, tx: mpsc::Sender<f64>, poll_interval: Duration)
where
    F: FnMut() -> Result<f64, SensorError>,
{
    while !tx.is_closed() {
        match read() {
            Ok(heading) => {
                if tx.blocking_send(heading).is_err() {
                    break;
                }
            }
            Err(SensorError::NotReady) => trace!("Magnetometer data not ready"),
            Err(e) => debug!("Compass read failed: {}", e),
        }
        thread::sleep(poll_interval);
    }
    debug!("Compass watch ended");
}
