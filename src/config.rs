use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AppError, Result};

pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;

// Rate limiter pacing
pub const SPOTIFY_MIN_REQUEST_INTERVAL_MS: u64 = 100;
pub const YOUTUBE_MIN_REQUEST_INTERVAL_MS: u64 = 250;
pub const RATE_LIMIT_BACKOFF_MS: u64 = 5000;

// Liked-content cache
pub const LIKED_PAGE_SIZE: u32 = 50;
pub const LIKED_CACHE_TTL_SECONDS: u64 = 30 * 60;
pub const BACKGROUND_PAGE_DELAY_MS: u64 = 1000;
pub const MAX_BACKGROUND_PAGES: usize = 10;

// Playlist classification
pub const PLAYLIST_SAMPLE_SIZE: u32 = 10;
pub const MUSIC_RATIO_THRESHOLD: f64 = 0.6;
pub const MAX_PLAYLISTS_TO_CLASSIFY: usize = 20;
pub const PLAYLIST_PAGE_SIZE: u32 = 50;

pub const MAX_UNIFIED_ARTISTS: usize = 20;
pub const SEARCH_LIMIT: u32 = 20;

// Playback
pub const EMBED_SKIP_DELAY_MS: u64 = 2000;
pub const END_OF_TRACK_TOLERANCE_MS: u64 = 1500;
pub const DEFAULT_VOLUME: u8 = 50;

// Polling
pub const NOW_PLAYING_POLL_SECONDS: u64 = 15;
pub const PLAYBACK_STATE_POLL_SECONDS: u64 = 5;
pub const DEVICE_STATUS_POLL_SECONDS: u64 = 30;

pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dualdeck")
}

pub fn get_config_file_path() -> PathBuf {
    get_config_dir().join("config.json")
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub spotify_client_id: String,
    pub spotify_api_url: String,
    pub spotify_accounts_url: String,
    pub youtube_client_id: String,
    pub youtube_client_secret: Option<String>,
    pub youtube_api_url: String,
    pub youtube_token_url: String,
    pub backend_url: String,
    pub database_path: PathBuf,
    /// Whole-request budget for provider and backend calls, body included.
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            spotify_client_id: String::new(),
            spotify_api_url: "https://api.spotify.com/v1".to_string(),
            spotify_accounts_url: "https://accounts.spotify.com".to_string(),
            youtube_client_id: String::new(),
            youtube_client_secret: None,
            youtube_api_url: "https://www.googleapis.com/youtube/v3".to_string(),
            youtube_token_url: "https://oauth2.googleapis.com/token".to_string(),
            backend_url: "http://localhost:8000".to_string(),
            database_path: get_config_dir().join("dualdeck.db"),
            request_timeout_secs: REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("Invalid config {:?}: {}", path, e)))?;

        if config.spotify_client_id.is_empty() {
            log::warn!("spotify_client_id is empty; token refresh will fail");
        }

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}
