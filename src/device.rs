use std::sync::Arc;

use crate::errors::Result;
use crate::providers::SpotifyApi;
use crate::storage::{keys, Persistence};

/// Tracks the Web Playback SDK device that start-playback targets.
pub struct DeviceManager {
    api: Arc<dyn SpotifyApi>,
    persistence: Persistence,
}

impl DeviceManager {
    pub fn new(api: Arc<dyn SpotifyApi>, persistence: Persistence) -> Self {
        Self { api, persistence }
    }

    pub async fn device_id(&self) -> Result<Option<String>> {
        Ok(self
            .persistence
            .get_string(keys::SPOTIFY_DEVICE_ID)
            .await?
            .filter(|id| !id.is_empty()))
    }

    pub async fn set_device_id(&self, device_id: &str) -> Result<()> {
        log::info!("[Device] web player ready: {}", device_id);
        self.persistence
            .set_string(keys::SPOTIFY_DEVICE_ID, device_id)
            .await
    }

    /// Forget `device_id` if it is the stored device.
    pub async fn device_gone(&self, device_id: &str) -> Result<()> {
        if self.device_id().await?.as_deref() == Some(device_id) {
            log::info!("[Device] web player went offline: {}", device_id);
            self.persistence.remove(keys::SPOTIFY_DEVICE_ID).await?;
        }
        Ok(())
    }

    /// Whether the stored device is still listed by the account.
    /// A device that disappeared is forgotten.
    pub async fn refresh_device_status(&self) -> Result<bool> {
        let Some(stored) = self.device_id().await? else {
            return Ok(false);
        };

        let devices = self.api.devices().await?;
        if devices.iter().any(|d| d.id.as_deref() == Some(stored.as_str())) {
            return Ok(true);
        }

        log::warn!("[Device] stored device {} no longer available", stored);
        self.persistence.remove(keys::SPOTIFY_DEVICE_ID).await?;
        Ok(false)
    }
}
