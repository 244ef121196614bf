//! Composition root for the dashboard.
//!
//! Wires both provider clients, the YouTube content caches, the playback
//! core and the backend bridge together, and exposes the browse, search
//! and session operations the UI calls. Playback operations live on
//! [`PlaybackCore`], reachable through [`Dashboard::core`].

use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{
    AppConfig, DEVICE_STATUS_POLL_SECONDS, MAX_PLAYLISTS_TO_CLASSIFY, MAX_UNIFIED_ARTISTS,
    NOW_PLAYING_POLL_SECONDS, PLAYBACK_STATE_POLL_SECONDS, PLAYLIST_PAGE_SIZE,
    RATE_LIMIT_BACKOFF_MS, SEARCH_LIMIT, SPOTIFY_MIN_REQUEST_INTERVAL_MS,
    YOUTUBE_MIN_REQUEST_INTERVAL_MS,
};
use crate::device::DeviceManager;
use crate::errors::{AppError, Result};
use crate::lyrics::{HttpLyricsBackend, LyricsBackend, NowPlayingRecord};
use crate::mapper::{
    channels_from_videos, merge_artists, spotify_artist_to_unified, spotify_playlist_to_unified,
    spotify_track_to_unified, youtube_channel_to_unified, youtube_playlist_item_to_unified,
    youtube_playlist_to_unified, youtube_video_to_unified,
};
use crate::models::{PlaylistOrigin, UnifiedArtist, UnifiedPlaylist, UnifiedTrack};
use crate::now_playing::NowPlayingBridge;
use crate::opener::UrlOpener;
use crate::playback::PlaybackCore;
use crate::players::YoutubePlayerFactory;
use crate::poller::Poller;
use crate::providers::{SpotifyApi, YoutubeApi};
use crate::rate_limiter::RateLimiter;
use crate::spotify::format_duration_ms;
use crate::spotify::models::SpotifyTrack;
use crate::spotify::SpotifyClient;
use crate::storage::{keys, Persistence};
use crate::youtube::models::{YoutubePlaylist, YoutubePlaylistItem};
use crate::youtube::{LikedContentCache, PlaylistMusicClassifier, YoutubeClient};

/// Everything the dashboard is built from.
pub struct DashboardParts {
    pub spotify: Arc<dyn SpotifyApi>,
    pub youtube: Arc<dyn YoutubeApi>,
    pub spotify_limiter: Arc<RateLimiter>,
    pub youtube_limiter: Arc<RateLimiter>,
    pub persistence: Persistence,
    pub backend: Arc<dyn LyricsBackend>,
    pub youtube_players: Arc<dyn YoutubePlayerFactory>,
    pub opener: Arc<dyn UrlOpener>,
}

pub struct Dashboard {
    spotify: Arc<dyn SpotifyApi>,
    youtube: Arc<dyn YoutubeApi>,
    spotify_limiter: Arc<RateLimiter>,
    youtube_limiter: Arc<RateLimiter>,
    persistence: Persistence,
    liked: Arc<LikedContentCache>,
    playlist_classifier: PlaylistMusicClassifier,
    now_playing: Arc<NowPlayingBridge>,
    core: Arc<PlaybackCore>,
    pollers: Mutex<Vec<Poller>>,
}

impl Dashboard {
    pub fn new(parts: DashboardParts) -> Self {
        let devices = Arc::new(DeviceManager::new(
            parts.spotify.clone(),
            parts.persistence.clone(),
        ));
        let now_playing = NowPlayingBridge::new(parts.backend);
        let core = PlaybackCore::new(
            parts.spotify.clone(),
            devices,
            parts.youtube_players,
            parts.persistence.clone(),
            parts.opener,
            now_playing.clone(),
        );

        Self {
            liked: LikedContentCache::new(parts.youtube.clone()),
            playlist_classifier: PlaylistMusicClassifier::new(parts.youtube.clone()),
            spotify: parts.spotify,
            youtube: parts.youtube,
            spotify_limiter: parts.spotify_limiter,
            youtube_limiter: parts.youtube_limiter,
            persistence: parts.persistence,
            now_playing,
            core,
            pollers: Mutex::new(Vec::new()),
        }
    }

    /// Build against the real services described by `config`.
    pub fn connect(
        config: &AppConfig,
        persistence: Persistence,
        youtube_players: Arc<dyn YoutubePlayerFactory>,
        opener: Arc<dyn UrlOpener>,
    ) -> Result<Self> {
        let backoff = Duration::from_millis(RATE_LIMIT_BACKOFF_MS);
        let spotify_limiter = Arc::new(RateLimiter::new(
            "spotify",
            Duration::from_millis(SPOTIFY_MIN_REQUEST_INTERVAL_MS),
            backoff,
        ));
        let youtube_limiter = Arc::new(RateLimiter::new(
            "youtube",
            Duration::from_millis(YOUTUBE_MIN_REQUEST_INTERVAL_MS),
            backoff,
        ));

        let spotify = SpotifyClient::new(config, persistence.clone(), spotify_limiter.clone())?;
        let youtube = YoutubeClient::new(config, persistence.clone(), youtube_limiter.clone())?;

        Ok(Self::new(DashboardParts {
            spotify: Arc::new(spotify),
            youtube: Arc::new(youtube),
            spotify_limiter,
            youtube_limiter,
            persistence,
            backend: Arc::new(HttpLyricsBackend::new(config)?),
            youtube_players,
            opener,
        }))
    }

    pub fn core(&self) -> &Arc<PlaybackCore> {
        &self.core
    }

    /// Spotify playlists, then YouTube playlists that look like music.
    pub async fn get_unified_playlists(&self) -> Result<Vec<UnifiedPlaylist>> {
        let (spotify, youtube) = tokio::join!(
            self.spotify_playlists(),
            self.youtube_music_playlists()
        );
        merge_provider_results("playlists", spotify, youtube)
    }

    async fn spotify_playlists(&self) -> Result<Vec<UnifiedPlaylist>> {
        let playlists = self.spotify.current_user_playlists(PLAYLIST_PAGE_SIZE).await?;
        Ok(playlists.iter().map(spotify_playlist_to_unified).collect())
    }

    /// Only the most recent playlists are classified. Empty ones are
    /// skipped without sampling.
    async fn youtube_music_playlists(&self) -> Result<Vec<UnifiedPlaylist>> {
        let listing = self.youtube.my_playlists(None, PLAYLIST_PAGE_SIZE).await?;
        let candidates: Vec<YoutubePlaylist> = listing
            .items
            .into_iter()
            .take(MAX_PLAYLISTS_TO_CLASSIFY)
            .filter(|p| p.content_details.item_count > 0)
            .collect();

        let verdicts = join_all(
            candidates
                .iter()
                .map(|p| self.playlist_classifier.is_music_playlist(&p.id)),
        )
        .await;

        Ok(candidates
            .iter()
            .zip(verdicts)
            .filter_map(|(playlist, verdict)| match verdict {
                Ok(true) => Some(youtube_playlist_to_unified(playlist)),
                Ok(false) => None,
                Err(e) => {
                    log::warn!("Skipping playlist {}: {}", playlist.id, e);
                    None
                }
            })
            .collect())
    }

    pub async fn get_unified_playlist_tracks(
        &self,
        playlist: &UnifiedPlaylist,
    ) -> Result<Vec<UnifiedTrack>> {
        match &playlist.original_data {
            PlaylistOrigin::Spotify(p) => {
                let tracks = self.spotify.playlist_tracks(&p.id).await?;
                Ok(tracks.iter().filter_map(unified_spotify_track).collect())
            }
            PlaylistOrigin::Youtube(p) => {
                let items = self.all_playlist_items(&p.id).await?;
                Ok(items
                    .iter()
                    .filter_map(youtube_playlist_item_to_unified)
                    .collect())
            }
        }
    }

    async fn all_playlist_items(&self, playlist_id: &str) -> Result<Vec<YoutubePlaylistItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .youtube
                .playlist_items(playlist_id, page_token.as_deref(), PLAYLIST_PAGE_SIZE)
                .await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(items)
    }

    /// Spotify top artists merged with the channels behind liked videos,
    /// deduplicated by name.
    pub async fn get_unified_artists(&self) -> Result<Vec<UnifiedArtist>> {
        let (spotify, youtube) = tokio::join!(self.spotify_artists(), self.youtube_artists());
        let artists = merge_provider_results("artists", spotify, youtube)?;
        Ok(merge_artists(artists, MAX_UNIFIED_ARTISTS))
    }

    async fn spotify_artists(&self) -> Result<Vec<UnifiedArtist>> {
        let artists = self.spotify.top_artists(MAX_UNIFIED_ARTISTS as u32).await?;
        Ok(artists.iter().map(spotify_artist_to_unified).collect())
    }

    async fn youtube_artists(&self) -> Result<Vec<UnifiedArtist>> {
        let liked = self.liked.get_liked_videos_for_search().await?;
        Ok(channels_from_videos(&liked.items)
            .iter()
            .map(youtube_channel_to_unified)
            .collect())
    }

    /// Spotify catalogue search plus matches among liked YouTube videos.
    pub async fn search_tracks(&self, query: &str) -> Result<Vec<UnifiedTrack>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let (spotify, youtube) = tokio::join!(
            self.spotify.search_tracks(query, SEARCH_LIMIT),
            self.liked.get_liked_videos_for_search()
        );

        let spotify = spotify.map(|tracks| {
            tracks
                .iter()
                .filter_map(unified_spotify_track)
                .collect::<Vec<_>>()
        });
        let youtube = youtube.map(|liked| {
            liked
                .items
                .iter()
                .filter(|v| {
                    matches_query(
                        query,
                        &[v.snippet.title.as_str(), v.snippet.channel_title.as_str()],
                    )
                })
                .take(SEARCH_LIMIT as usize)
                .map(youtube_video_to_unified)
                .collect::<Vec<_>>()
        });
        merge_provider_results("search", spotify, youtube)
    }

    /// Matches inside one playlist. YouTube results remember the playlist
    /// they were found in.
    pub async fn search_playlist_tracks(
        &self,
        playlist: &UnifiedPlaylist,
        query: &str,
    ) -> Result<Vec<UnifiedTrack>> {
        let query = query.trim();
        match &playlist.original_data {
            PlaylistOrigin::Spotify(p) => {
                let tracks = self.spotify.playlist_tracks(&p.id).await?;
                Ok(tracks
                    .iter()
                    .filter_map(unified_spotify_track)
                    .filter(|t| {
                        let album = t.album.as_deref().unwrap_or("");
                        matches_query(query, &[t.name.as_str(), t.artist.as_str(), album])
                    })
                    .collect())
            }
            PlaylistOrigin::Youtube(p) => {
                let items = self.all_playlist_items(&p.id).await?;
                Ok(items
                    .into_iter()
                    .filter(|i| matches_query(query, &[i.snippet.title.as_str(), i.channel_title()]))
                    .map(|mut item| {
                        item.playlist_name = Some(playlist.name.clone());
                        item
                    })
                    .filter_map(|item| youtube_playlist_item_to_unified(&item))
                    .collect())
            }
        }
    }

    pub async fn send_chat_message(&self, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Internal("Chat message is empty".to_string()));
        }
        self.now_playing.backend().send_chat_message(query).await
    }

    /// Last record read by the now-playing poll.
    pub fn remote_now_playing(&self) -> Option<NowPlayingRecord> {
        self.now_playing.remote()
    }

    /// Start the background refresh loops. Replaces loops already running.
    pub fn start_polling(&self) {
        let mut pollers = self.pollers.lock();
        pollers.clear();

        let bridge = self.now_playing.clone();
        pollers.push(Poller::spawn(
            "now-playing",
            Duration::from_secs(NOW_PLAYING_POLL_SECONDS),
            move || {
                let bridge = bridge.clone();
                async move {
                    if let Err(e) = bridge.refresh_remote().await {
                        log::debug!("Now playing refresh failed: {}", e);
                    }
                }
            },
        ));

        let spotify = self.spotify.clone();
        let core = self.core.clone();
        pollers.push(Poller::spawn(
            "playback-state",
            Duration::from_secs(PLAYBACK_STATE_POLL_SECONDS),
            move || {
                let spotify = spotify.clone();
                let core = core.clone();
                async move {
                    match spotify.current_playback().await {
                        Ok(state) => core.apply_remote_playback(state),
                        Err(e) => log::debug!("Playback state refresh failed: {}", e),
                    }
                }
            },
        ));

        let core = self.core.clone();
        pollers.push(Poller::spawn(
            "device-status",
            Duration::from_secs(DEVICE_STATUS_POLL_SECONDS),
            move || {
                let core = core.clone();
                async move {
                    if let Err(e) = core.devices().refresh_device_status().await {
                        log::debug!("Device status refresh failed: {}", e);
                    }
                }
            },
        ));

        log::info!("Started {} background refresh loops", pollers.len());
    }

    pub fn stop_polling(&self) {
        self.pollers.lock().clear();
    }

    /// End both provider sessions and drop everything derived from them.
    pub async fn logout(&self) -> Result<()> {
        log::info!("Logging out of all providers");
        self.stop_polling();
        self.spotify_limiter.clear();
        self.youtube_limiter.clear();
        self.liked.invalidate();
        self.playlist_classifier.clear_cache();
        self.core.shutdown().await;

        self.persistence.remove_all(keys::SPOTIFY_SESSION_KEYS).await?;
        self.persistence.remove_all(keys::YOUTUBE_SESSION_KEYS).await
    }
}

fn unified_spotify_track(track: &SpotifyTrack) -> Option<UnifiedTrack> {
    spotify_track_to_unified(track, format_duration_ms(track.duration_ms).into())
}

fn matches_query(query: &str, fields: &[&str]) -> bool {
    let query = query.to_lowercase();
    fields.iter().any(|f| f.to_lowercase().contains(&query))
}

/// Either provider may be unavailable (logged out, offline). Its results
/// are then omitted; the call fails only when both providers fail.
fn merge_provider_results<T>(
    operation: &str,
    spotify: Result<Vec<T>>,
    youtube: Result<Vec<T>>,
) -> Result<Vec<T>> {
    match (spotify, youtube) {
        (Ok(mut a), Ok(b)) => {
            a.extend(b);
            Ok(a)
        }
        (Ok(a), Err(e)) => {
            log::warn!("YouTube {} unavailable: {}", operation, e);
            Ok(a)
        }
        (Err(e), Ok(b)) => {
            log::warn!("Spotify {} unavailable: {}", operation, e);
            Ok(b)
        }
        (Err(e), Err(other)) => {
            log::error!("{} failed on both providers: {} / {}", operation, e, other);
            Err(e)
        }
    }
}
