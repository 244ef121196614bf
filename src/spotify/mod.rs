pub mod client;
pub mod models;

pub use client::SpotifyClient;
pub use models::*;

pub const TRACK_URL: &str = "https://open.spotify.com/track/";

pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

pub fn track_url(track_id: &str) -> String {
    format!("{}{}", TRACK_URL, track_id)
}

/// `m:ss` display form of a millisecond duration.
pub fn format_duration_ms(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
