//! In-memory fakes of the provider, player and backend seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::errors::{AppError, Result};
use crate::lyrics::{LyricsBackend, NowPlayingRecord, NowPlayingUpdate};
use crate::mapper::{spotify_track_to_unified, youtube_video_to_unified};
use crate::models::UnifiedTrack;
use crate::opener::UrlOpener;
use crate::players::{SpotifyPlayer, YoutubePlayer, YoutubePlayerFactory};
use crate::providers::{SpotifyApi, YoutubeApi};
use crate::spotify::format_duration_ms;
use crate::spotify::models::*;
use crate::youtube::models::*;

/// Ordered record of calls across several fakes.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

pub fn spotify_track(id: &str) -> SpotifyTrack {
    SpotifyTrack {
        id: Some(id.to_string()),
        name: format!("Track {}", id),
        artists: vec![SpotifyArtistRef {
            id: Some(format!("artist-{}", id)),
            name: "Spotify Artist".to_string(),
            external_urls: ExternalUrls::default(),
        }],
        album: Some(SpotifyAlbumRef {
            id: None,
            name: "Album".to_string(),
            images: Vec::new(),
            external_urls: ExternalUrls::default(),
        }),
        duration_ms: 180_000,
        uri: format!("spotify:track:{}", id),
        external_urls: ExternalUrls {
            spotify: Some(format!("https://open.spotify.com/track/{}", id)),
        },
        is_playable: Some(true),
    }
}

pub fn spotify_artist(id: &str, name: &str) -> SpotifyArtist {
    SpotifyArtist {
        id: id.to_string(),
        name: name.to_string(),
        images: Vec::new(),
        followers: None,
        popularity: None,
        genres: Vec::new(),
        external_urls: ExternalUrls::default(),
    }
}

pub fn spotify_playlist(id: &str, total: u32) -> SpotifyPlaylist {
    SpotifyPlaylist {
        id: id.to_string(),
        name: format!("Playlist {}", id),
        description: None,
        images: None,
        tracks: Some(TracksRef { total }),
        owner: PlaylistOwner {
            id: "me".to_string(),
            display_name: Some("Me".to_string()),
        },
        public: Some(true),
        collaborative: false,
        external_urls: ExternalUrls::default(),
    }
}

pub fn spotify_unified(id: &str) -> UnifiedTrack {
    let track = spotify_track(id);
    spotify_track_to_unified(&track, format_duration_ms(track.duration_ms).into())
        .expect("fake track has an id")
}

/// A video the classifier accepts as music.
pub fn music_video(id: &str) -> YoutubeVideo {
    YoutubeVideo {
        id: id.to_string(),
        snippet: VideoSnippet {
            title: format!("Song {}", id),
            channel_id: Some(format!("channel-{}", id)),
            channel_title: "Some Artist - Topic".to_string(),
            ..Default::default()
        },
        content_details: None,
        playlist_name: None,
    }
}

pub fn youtube_unified(id: &str) -> UnifiedTrack {
    youtube_video_to_unified(&music_video(id))
}

fn playlist_item(video_id: &str, title: &str, channel: &str) -> YoutubePlaylistItem {
    YoutubePlaylistItem {
        id: format!("item-{}", video_id),
        snippet: PlaylistItemSnippet {
            title: title.to_string(),
            channel_title: "Playlist Owner".to_string(),
            video_owner_channel_title: Some(channel.to_string()),
            resource_id: ResourceId {
                video_id: Some(video_id.to_string()),
            },
            ..Default::default()
        },
        playlist_name: None,
    }
}

pub fn music_item(video_id: &str) -> YoutubePlaylistItem {
    playlist_item(video_id, &format!("Song {}", video_id), "ArtistVEVO")
}

pub fn other_item(video_id: &str) -> YoutubePlaylistItem {
    playlist_item(video_id, &format!("Clip {}", video_id), "Random Channel")
}

pub fn youtube_playlist(id: &str, item_count: u32) -> YoutubePlaylist {
    YoutubePlaylist {
        id: id.to_string(),
        snippet: PlaylistSnippet {
            title: format!("Playlist {}", id),
            channel_title: "Me".to_string(),
            ..Default::default()
        },
        content_details: PlaylistContentDetails { item_count },
        status: PlaylistStatus {
            privacy_status: Some("private".to_string()),
        },
    }
}

#[derive(Default)]
pub struct FakeSpotify {
    log: CallLog,
    devices: Mutex<Vec<Device>>,
    playlists: Mutex<Vec<SpotifyPlaylist>>,
    playlist_tracks: Mutex<HashMap<String, Vec<SpotifyTrack>>>,
    top_artists: Mutex<Vec<SpotifyArtist>>,
    search_results: Mutex<Vec<SpotifyTrack>>,
    playback: Mutex<Option<PlaybackState>>,
    start_error: Mutex<Option<AppError>>,
    resume_error: Mutex<Option<AppError>>,
    last_device: Mutex<Option<String>>,
}

impl FakeSpotify {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn set_devices(&self, ids: &[&str]) {
        *self.devices.lock() = ids
            .iter()
            .map(|id| Device {
                id: Some(id.to_string()),
                name: format!("Device {}", id),
                is_active: false,
                volume_percent: None,
            })
            .collect();
    }

    pub fn set_playlists(&self, playlists: Vec<SpotifyPlaylist>) {
        *self.playlists.lock() = playlists;
    }

    pub fn set_playlist_tracks(&self, playlist_id: &str, tracks: Vec<SpotifyTrack>) {
        self.playlist_tracks
            .lock()
            .insert(playlist_id.to_string(), tracks);
    }

    pub fn set_top_artists(&self, artists: Vec<SpotifyArtist>) {
        *self.top_artists.lock() = artists;
    }

    pub fn set_search_results(&self, tracks: Vec<SpotifyTrack>) {
        *self.search_results.lock() = tracks;
    }

    pub fn set_playback(&self, playback: Option<PlaybackState>) {
        *self.playback.lock() = playback;
    }

    pub fn fail_start_playback(&self, error: AppError) {
        *self.start_error.lock() = Some(error);
    }

    pub fn fail_resume(&self, error: AppError) {
        *self.resume_error.lock() = Some(error);
    }

    pub fn last_device(&self) -> Option<String> {
        self.last_device.lock().clone()
    }
}

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn start_playback(&self, device_id: Option<&str>, uris: &[String]) -> Result<()> {
        self.log
            .push(format!("spotify_api:start_playback:{}", uris.join(",")));
        *self.last_device.lock() = device_id.map(String::from);
        match self.start_error.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn pause_playback(&self, _device_id: Option<&str>) -> Result<()> {
        self.log.push("spotify_api:pause_playback");
        Ok(())
    }

    async fn resume_playback(&self, _device_id: Option<&str>) -> Result<()> {
        self.log.push("spotify_api:resume_playback");
        match self.resume_error.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn set_volume(&self, percent: u8, _device_id: Option<&str>) -> Result<()> {
        self.log.push(format!("spotify_api:set_volume:{}", percent));
        Ok(())
    }

    async fn current_playback(&self) -> Result<Option<PlaybackState>> {
        Ok(self.playback.lock().clone())
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.devices.lock().clone())
    }

    async fn search_tracks(&self, _query: &str, limit: u32) -> Result<Vec<SpotifyTrack>> {
        let results = self.search_results.lock();
        Ok(results.iter().take(limit as usize).cloned().collect())
    }

    async fn current_user_playlists(&self, limit: u32) -> Result<Vec<SpotifyPlaylist>> {
        let playlists = self.playlists.lock();
        Ok(playlists.iter().take(limit as usize).cloned().collect())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<SpotifyTrack>> {
        self.playlist_tracks
            .lock()
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(playlist_id.to_string()))
    }

    async fn top_artists(&self, limit: u32) -> Result<Vec<SpotifyArtist>> {
        let artists = self.top_artists.lock();
        Ok(artists.iter().take(limit as usize).cloned().collect())
    }
}

#[derive(Default)]
pub struct FakeYoutube {
    liked_pages: Mutex<HashMap<Option<String>, ListResponse<YoutubeVideo>>>,
    liked_calls: Mutex<Vec<Option<String>>>,
    playlists: Mutex<Vec<YoutubePlaylist>>,
    playlist_items: Mutex<HashMap<String, Vec<YoutubePlaylistItem>>>,
    playlist_item_calls: AtomicUsize,
    logged_out: AtomicBool,
}

impl FakeYoutube {
    pub fn set_liked_page(&self, token: Option<&str>, page: ListResponse<YoutubeVideo>) {
        self.liked_pages
            .lock()
            .insert(token.map(String::from), page);
    }

    pub fn liked_calls(&self) -> Vec<Option<String>> {
        self.liked_calls.lock().clone()
    }

    pub fn set_playlists(&self, playlists: Vec<YoutubePlaylist>) {
        *self.playlists.lock() = playlists;
    }

    pub fn set_playlist(&self, playlist_id: &str, items: Vec<YoutubePlaylistItem>) {
        self.playlist_items
            .lock()
            .insert(playlist_id.to_string(), items);
    }

    pub fn playlist(&self, playlist_id: &str) -> Vec<YoutubePlaylistItem> {
        self.playlist_items
            .lock()
            .get(playlist_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn playlist_item_calls(&self) -> usize {
        self.playlist_item_calls.load(Ordering::SeqCst)
    }

    /// Every call fails with an auth error afterwards.
    pub fn log_out(&self) {
        self.logged_out.store(true, Ordering::SeqCst);
    }

    fn check_session(&self) -> Result<()> {
        if self.logged_out.load(Ordering::SeqCst) {
            return Err(AppError::Auth("Not logged in to youtube".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl YoutubeApi for FakeYoutube {
    async fn liked_videos(
        &self,
        page_token: Option<&str>,
        _max_results: u32,
    ) -> Result<ListResponse<YoutubeVideo>> {
        self.check_session()?;
        let token = page_token.map(String::from);
        self.liked_calls.lock().push(token.clone());
        self.liked_pages
            .lock()
            .get(&token)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("page {:?}", token)))
    }

    /// Page tokens are offsets into the stored items.
    async fn playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<YoutubePlaylistItem>> {
        self.check_session()?;
        self.playlist_item_calls.fetch_add(1, Ordering::SeqCst);
        let items = self.playlist(playlist_id);
        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + max_results as usize).min(items.len());
        Ok(ListResponse {
            items: items.get(start..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_page_token: (end < items.len()).then(|| end.to_string()),
            page_info: None,
        })
    }

    async fn my_playlists(
        &self,
        _page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<YoutubePlaylist>> {
        self.check_session()?;
        let playlists = self.playlists.lock();
        Ok(ListResponse {
            items: playlists.iter().take(max_results as usize).cloned().collect(),
            next_page_token: None,
            page_info: None,
        })
    }
}

pub struct FakeSpotifyPlayer {
    log: CallLog,
}

impl FakeSpotifyPlayer {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl SpotifyPlayer for FakeSpotifyPlayer {
    async fn connect(&self) -> Result<bool> {
        self.log.push("spotify_sdk:connect");
        Ok(true)
    }

    async fn pause(&self) -> Result<()> {
        self.log.push("spotify_sdk:pause");
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.log.push("spotify_sdk:resume");
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.log.push(format!("spotify_sdk:set_volume:{:.2}", volume));
        Ok(())
    }
}

pub struct FakeYoutubePlayer {
    log: CallLog,
}

#[async_trait]
impl YoutubePlayer for FakeYoutubePlayer {
    async fn load_and_play(&self, video_id: &str) -> Result<()> {
        self.log.push(format!("youtube:load_and_play:{}", video_id));
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.log.push("youtube:play");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.log.push("youtube:pause");
        Ok(())
    }

    async fn mute(&self) -> Result<()> {
        self.log.push("youtube:mute");
        Ok(())
    }

    async fn unmute(&self) -> Result<()> {
        self.log.push("youtube:unmute");
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.log.push(format!("youtube:set_volume:{}", percent));
        Ok(())
    }

    async fn current_time(&self) -> Result<f64> {
        Ok(0.0)
    }

    async fn duration(&self) -> Result<f64> {
        Ok(0.0)
    }
}

pub struct FakeYoutubeFactory {
    log: CallLog,
    created: AtomicUsize,
}

impl FakeYoutubeFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl YoutubePlayerFactory for FakeYoutubeFactory {
    async fn create(&self) -> Result<Arc<dyn YoutubePlayer>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeYoutubePlayer {
            log: self.log.clone(),
        }))
    }
}

#[derive(Default)]
pub struct FakeOpener {
    opened: Mutex<Vec<String>>,
}

impl FakeOpener {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl UrlOpener for FakeOpener {
    fn open(&self, url: &str) -> Result<()> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBackend {
    updates: Mutex<Vec<NowPlayingUpdate>>,
    remote: Mutex<Option<NowPlayingRecord>>,
    /// When set, each update waits for a permit.
    gate: Option<Semaphore>,
    fail_updates: AtomicBool,
}

impl FakeBackend {
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn release(&self, permits: usize) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn updates(&self) -> Vec<NowPlayingUpdate> {
        self.updates.lock().clone()
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn set_remote(&self, record: Option<NowPlayingRecord>) {
        *self.remote.lock() = record;
    }
}

#[async_trait]
impl LyricsBackend for FakeBackend {
    async fn get_now_playing(&self) -> Result<Option<NowPlayingRecord>> {
        Ok(self.remote.lock().clone())
    }

    async fn update_now_playing(&self, update: &NowPlayingUpdate) -> Result<()> {
        self.updates.lock().push(update.clone());
        if let Some(ref gate) = self.gate {
            gate.acquire()
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?
                .forget();
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Network("backend down".to_string()));
        }
        Ok(())
    }

    async fn send_chat_message(&self, query: &str) -> Result<String> {
        Ok(format!("answer to {}", query))
    }
}
