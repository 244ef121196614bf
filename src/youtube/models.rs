//! YouTube Data API v3 payloads, limited to the fields the dashboard reads.

use serde::{Deserialize, Serialize};

pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
pub const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=";
pub const CHANNEL_URL: &str = "https://www.youtube.com/channel/";

pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", WATCH_URL, video_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Thumbnail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<Thumbnail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Thumbnail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoContentDetails {
    /// ISO-8601 duration such as `PT3M21S`.
    pub duration: Option<String>,
}

/// A liked or searched video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeVideo {
    pub id: String,
    pub snippet: VideoSnippet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_details: Option<VideoContentDetails>,
    /// Set by playlist-scoped search; never sent by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: String,
    pub video_owner_channel_title: Option<String>,
    pub video_owner_channel_id: Option<String>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
    pub position: Option<u32>,
    #[serde(default)]
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePlaylistItem {
    pub id: String,
    pub snippet: PlaylistItemSnippet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_name: Option<String>,
}

impl YoutubePlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        self.snippet.resource_id.video_id.as_deref()
    }

    /// Channel that uploaded the video, not the playlist owner.
    pub fn channel_title(&self) -> &str {
        self.snippet
            .video_owner_channel_title
            .as_deref()
            .unwrap_or(&self.snippet.channel_title)
    }

    /// Deleted and private videos stay in playlists as placeholders.
    pub fn is_available(&self) -> bool {
        let title = self.snippet.title.as_str();
        self.video_id().is_some_and(|id| !id.is_empty())
            && title != "Deleted video"
            && title != "Private video"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistContentDetails {
    #[serde(default)]
    pub item_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistStatus {
    pub privacy_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubePlaylist {
    pub id: String,
    pub snippet: PlaylistSnippet,
    #[serde(default)]
    pub content_details: PlaylistContentDetails,
    #[serde(default)]
    pub status: PlaylistStatus,
}

/// Channel derived from video metadata, used as the artist shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoutubeChannel {
    pub id: String,
    pub title: String,
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_results: Option<u32>,
    pub results_per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
    pub page_info: Option<PageInfo>,
}

impl<T> ListResponse<T> {
    pub fn has_more(&self) -> bool {
        self.next_page_token.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
    pub snippet: VideoSnippet,
}

impl SearchResult {
    pub fn into_video(self) -> Option<YoutubeVideo> {
        let id = self.id.video_id?;
        Some(YoutubeVideo {
            id,
            snippet: self.snippet,
            content_details: None,
            playlist_name: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}
