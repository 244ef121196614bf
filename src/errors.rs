use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, PartialEq)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Subscription or region restriction on the streaming provider.
    /// `fallback_url` opens the track in the provider's own web app.
    #[error("Playback restricted: {message}")]
    PlaybackRestricted {
        message: String,
        fallback_url: String,
    },

    #[error("Embedding restricted for video {0}")]
    EmbeddingRestricted(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Player error: {0}")]
    Player(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AppError::RateLimited(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Auth(_))
    }

    /// URL the UI can open when playback inside the dashboard is impossible.
    pub fn fallback_url(&self) -> Option<&str> {
        match self {
            AppError::PlaybackRestricted { fallback_url, .. } => Some(fallback_url),
            _ => None,
        }
    }
}

// Implement From traits for common error types to simplify conversion

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout(e.to_string())
        } else {
            AppError::Network(e.to_string())
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Parse(format!("Serialization error: {}", e))
    }
}
