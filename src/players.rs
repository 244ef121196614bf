//! Seams for the two embedded vendor players.
//!
//! The Web Playback SDK and the IFrame player live in the UI. The core
//! drives them through these traits and receives their events as plain
//! enums.

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::{AppError, Result};
use crate::spotify::models::SpotifyTrack;

/// Handle to a connected Web Playback SDK player.
#[async_trait]
pub trait SpotifyPlayer: Send + Sync {
    /// Returns `false` when the SDK refused the connection.
    async fn connect(&self) -> Result<bool>;
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
    /// SDK volume is a fraction in `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;
}

/// Handle to an IFrame player instance.
#[async_trait]
pub trait YoutubePlayer: Send + Sync {
    async fn load_and_play(&self, video_id: &str) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn mute(&self) -> Result<()>;
    async fn unmute(&self) -> Result<()>;
    async fn set_volume(&self, percent: u8) -> Result<()>;
    /// Seconds.
    async fn current_time(&self) -> Result<f64>;
    /// Seconds.
    async fn duration(&self) -> Result<f64>;
}

/// Builds the IFrame player the first time a video is played.
#[async_trait]
pub trait YoutubePlayerFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn YoutubePlayer>>;
}

/// For hosts without an IFrame player, such as the command-line tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEmbeddedPlayer;

#[async_trait]
impl YoutubePlayerFactory for NoEmbeddedPlayer {
    async fn create(&self) -> Result<Arc<dyn YoutubePlayer>> {
        Err(AppError::Unsupported(
            "Embedded YouTube playback is not available here".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SdkPlaybackState {
    pub paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub track: Option<SpotifyTrack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkErrorKind {
    Initialization,
    Authentication,
    Account,
    Playback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpotifyPlayerEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    StateChanged(SdkPlaybackState),
    Error { kind: SdkErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoutubePlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl YoutubePlayerState {
    /// Maps the IFrame API's numeric state.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoutubeErrorCode {
    InvalidParameter,
    Html5,
    NotFound,
    EmbedNotAllowed,
    /// 150 is 101 under another name.
    EmbedNotAllowedDisguised,
    Other(i32),
}

impl YoutubeErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => Self::InvalidParameter,
            5 => Self::Html5,
            100 => Self::NotFound,
            101 => Self::EmbedNotAllowed,
            150 => Self::EmbedNotAllowedDisguised,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidParameter => 2,
            Self::Html5 => 5,
            Self::NotFound => 100,
            Self::EmbedNotAllowed => 101,
            Self::EmbedNotAllowedDisguised => 150,
            Self::Other(code) => *code,
        }
    }

    pub fn is_embed_restriction(&self) -> bool {
        matches!(self, Self::EmbedNotAllowed | Self::EmbedNotAllowedDisguised)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "Invalid video id",
            Self::Html5 => "HTML5 player error",
            Self::NotFound => "Video not found or private",
            Self::EmbedNotAllowed | Self::EmbedNotAllowedDisguised => {
                "Video owner does not allow embedded playback"
            }
            Self::Other(_) => "Unknown player error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoutubePlayerEvent {
    Ready,
    StateChanged(YoutubePlayerState),
    Error(YoutubeErrorCode),
}
