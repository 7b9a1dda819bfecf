use std::thread;
use std::time::Duration;

use seek_rs::SensorError;
use seek_rs::compass_sensor::{Calibration, CompassSensor};
use tracing::debug;

/// Running min/max of the raw X/Y counts; the hard iron offset is the center.
#[derive(Debug)]
struct Extents {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    samples: u64,
}

impl Extents {
    fn new() -> Self {
        Self {
            x_min: f64::MAX,
            x_max: f64::MIN,
            y_min: f64::MAX,
            y_max: f64::MIN,
            samples: 0,
        }
    }

    fn add(&mut self, x: f64, y: f64) {
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
        self.samples += 1;
    }

    fn offsets(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }
}

fn main() -> Result<(), SensorError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("seek_rs=info")),
        )
        .init();

    println!("Magnetometer calibration");
    println!("1. Keep the board LEVEL");
    println!("2. Slowly rotate it through a FULL 360° circle (30s or more)");
    println!("3. Press Ctrl+C when done and paste the last [compass] block into your config\n");

    thread::sleep(Duration::from_secs(3));

    // Offsets are what we are measuring, so read uncorrected.
    let mut compass = CompassSensor::new(Calibration {
        x_offset: 0.0,
        y_offset: 0.0,
        heading_offset: 0.0,
    })?;
    let mut extents = Extents::new();

    println!("Collecting samples... (ROTATE NOW!)");
    loop {
        match compass.read_raw() {
            Ok((x, y)) => {
                extents.add(x, y);
                if extents.samples % 50 == 0 {
                    let (x_offset, y_offset) = extents.offsets();
                    println!(
                        "# {} samples, X {:.0}..{:.0}, Y {:.0}..{:.0}",
                        extents.samples, extents.x_min, extents.x_max, extents.y_min, extents.y_max
                    );
                    println!("[compass]\nx_offset = {:.1}\ny_offset = {:.1}\n", x_offset, y_offset);
                }
            }
            Err(e) => debug!("{}", e),
        }

        thread::sleep(Duration::from_millis(100));
    }
}
