use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::providers::ProviderTag;
use crate::spotify::models::{SpotifyArtist, SpotifyPlaylist, SpotifyTrack};
use crate::youtube::models::{YoutubeChannel, YoutubePlaylist, YoutubePlaylistItem, YoutubeVideo};

pub const UNKNOWN_DURATION: &str = "Unknown";

/// Display duration in provider-native form. `Unknown` means the provider did
/// not expose one; it is never a zero-length track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackDuration {
    Known(String),
    Unknown,
}

impl TrackDuration {
    pub fn is_known(&self) -> bool {
        matches!(self, TrackDuration::Known(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            TrackDuration::Known(s) => s,
            TrackDuration::Unknown => UNKNOWN_DURATION,
        }
    }
}

impl fmt::Display for TrackDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TrackDuration {
    fn from(s: String) -> Self {
        if s.is_empty() || s == UNKNOWN_DURATION {
            TrackDuration::Unknown
        } else {
            TrackDuration::Known(s)
        }
    }
}

impl Serialize for TrackDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TrackDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(String::deserialize(deserializer)?.into())
    }
}

/// Provider payload a unified track was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum TrackOrigin {
    Spotify(SpotifyTrack),
    YoutubeVideo(YoutubeVideo),
    YoutubePlaylistItem(YoutubePlaylistItem),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PlaylistOrigin {
    Spotify(SpotifyPlaylist),
    Youtube(YoutubePlaylist),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ArtistOrigin {
    Spotify(SpotifyArtist),
    Youtube(YoutubeChannel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedTrack {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: TrackDuration,
    pub image_url: Option<String>,
    pub source: ProviderTag,
    pub external_url: String,
    pub original_data: TrackOrigin,
}

impl UnifiedTrack {
    /// Ids are only unique within one provider.
    pub fn key(&self) -> (ProviderTag, &str) {
        (self.source, self.id.as_str())
    }

    pub fn same_track(&self, other: &UnifiedTrack) -> bool {
        self.key() == other.key()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub track_count: u32,
    pub owner: String,
    pub source: ProviderTag,
    pub is_public: bool,
    pub is_collaborative: Option<bool>,
    pub external_url: String,
    pub original_data: PlaylistOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedArtist {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub followers: Option<u64>,
    pub popularity: Option<u32>,
    pub genres: Option<Vec<String>>,
    pub source: ProviderTag,
    pub external_url: String,
    pub original_data: ArtistOrigin,
}

/// Read-only view of the playback core handed to the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub current_track: Option<UnifiedTrack>,
    pub playlist: Vec<UnifiedTrack>,
    pub is_playing: bool,
    pub active_provider: Option<ProviderTag>,
    pub volume: u8,
    pub is_muted: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_sentinel_round_trips_as_string() {
        let json = serde_json::to_string(&TrackDuration::Unknown).unwrap();
        assert_eq!(json, "\"Unknown\"");
        let parsed: TrackDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TrackDuration::Unknown);
        assert!(!parsed.is_known());

        let known: TrackDuration = serde_json::from_str("\"3:25\"").unwrap();
        assert_eq!(known, TrackDuration::Known("3:25".to_string()));
    }
}
