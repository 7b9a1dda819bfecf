//! Location permission on a Pi: can we read the GPS device at all?

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::warn;

use crate::sensors::PermissionGate;

pub struct DevicePermission {
    device: PathBuf,
}

impl DevicePermission {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

#[async_trait]
impl PermissionGate for DevicePermission {
    async fn request(&self) -> bool {
        match tokio::fs::File::open(&self.device).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Cannot open {}: {}", self.device.display(), e);
                false
            }
        }
    }
}
