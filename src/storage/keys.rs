//! Persisted key names. Every cross-component shared value lives under one of these.

pub const SPOTIFY_ACCESS_TOKEN: &str = "spotify_access_token";
pub const SPOTIFY_REFRESH_TOKEN: &str = "spotify_refresh_token";
pub const SPOTIFY_TOKEN_EXPIRES_AT: &str = "spotify_token_expires_at";
pub const SPOTIFY_DEVICE_ID: &str = "spotify_device_id";
pub const SPOTIFY_PROFILE: &str = "spotify_profile";

pub const YOUTUBE_ACCESS_TOKEN: &str = "youtube_access_token";
pub const YOUTUBE_REFRESH_TOKEN: &str = "youtube_refresh_token";
pub const YOUTUBE_TOKEN_EXPIRES_AT: &str = "youtube_token_expires_at";
pub const YOUTUBE_PROFILE: &str = "youtube_profile";

const EMBED_FAILED_PREFIX: &str = "youtube_embed_failed:";

pub const SPOTIFY_SESSION_KEYS: &[&str] = &[
    SPOTIFY_ACCESS_TOKEN,
    SPOTIFY_REFRESH_TOKEN,
    SPOTIFY_TOKEN_EXPIRES_AT,
    SPOTIFY_DEVICE_ID,
    SPOTIFY_PROFILE,
];

pub const YOUTUBE_SESSION_KEYS: &[&str] = &[
    YOUTUBE_ACCESS_TOKEN,
    YOUTUBE_REFRESH_TOKEN,
    YOUTUBE_TOKEN_EXPIRES_AT,
    YOUTUBE_PROFILE,
];

/// Marker recording that a video refused to play in the embedded player.
pub fn embed_failed(video_id: &str) -> String {
    format!("{}{}", EMBED_FAILED_PREFIX, video_id)
}
