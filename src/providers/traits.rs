use async_trait::async_trait;

use crate::errors::{AppError, Result};
use crate::spotify::models::{
    Device, PlaybackState, SpotifyAlbum, SpotifyArtist, SpotifyPlaylist, SpotifyTrack,
};
use crate::youtube::models::{ListResponse, YoutubePlaylist, YoutubePlaylistItem, YoutubeVideo};

fn unsupported<T>(operation: &str) -> Result<T> {
    Err(AppError::Unsupported(operation.to_string()))
}

/// Spotify Web API surface used by the dashboard and the playback core.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Start the given track URIs on a device (the active one when `None`).
    async fn start_playback(&self, device_id: Option<&str>, uris: &[String]) -> Result<()>;

    async fn pause_playback(&self, device_id: Option<&str>) -> Result<()>;

    /// Continue the current context without changing the track.
    async fn resume_playback(&self, device_id: Option<&str>) -> Result<()>;

    async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> Result<()>;

    async fn current_playback(&self) -> Result<Option<PlaybackState>>;

    async fn devices(&self) -> Result<Vec<Device>> {
        unsupported("devices")
    }

    async fn skip_next(&self, _device_id: Option<&str>) -> Result<()> {
        unsupported("skip_next")
    }

    async fn skip_previous(&self, _device_id: Option<&str>) -> Result<()> {
        unsupported("skip_previous")
    }

    async fn seek(&self, _position_ms: u64, _device_id: Option<&str>) -> Result<()> {
        unsupported("seek")
    }

    async fn search_tracks(&self, _query: &str, _limit: u32) -> Result<Vec<SpotifyTrack>> {
        unsupported("search_tracks")
    }

    async fn current_user_playlists(&self, _limit: u32) -> Result<Vec<SpotifyPlaylist>> {
        unsupported("current_user_playlists")
    }

    /// All playable tracks of a playlist; removed entries are skipped.
    async fn playlist_tracks(&self, _playlist_id: &str) -> Result<Vec<SpotifyTrack>> {
        unsupported("playlist_tracks")
    }

    async fn top_artists(&self, _limit: u32) -> Result<Vec<SpotifyArtist>> {
        unsupported("top_artists")
    }

    async fn recently_played(&self, _limit: u32) -> Result<Vec<SpotifyTrack>> {
        unsupported("recently_played")
    }

    async fn saved_tracks(&self, _limit: u32) -> Result<Vec<SpotifyTrack>> {
        unsupported("saved_tracks")
    }

    async fn get_track(&self, _track_id: &str) -> Result<SpotifyTrack> {
        unsupported("get_track")
    }

    async fn get_album(&self, _album_id: &str) -> Result<SpotifyAlbum> {
        unsupported("get_album")
    }

    async fn get_playlist(&self, _playlist_id: &str) -> Result<SpotifyPlaylist> {
        unsupported("get_playlist")
    }
}

/// YouTube Data API surface used by the content caches and the dashboard.
#[async_trait]
pub trait YoutubeApi: Send + Sync {
    async fn liked_videos(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<YoutubeVideo>>;

    async fn playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<YoutubePlaylistItem>>;

    async fn my_playlists(
        &self,
        _page_token: Option<&str>,
        _max_results: u32,
    ) -> Result<ListResponse<YoutubePlaylist>> {
        unsupported("my_playlists")
    }

    async fn search_videos(&self, _query: &str, _max_results: u32) -> Result<Vec<YoutubeVideo>> {
        unsupported("search_videos")
    }
}
