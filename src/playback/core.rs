//! Playback Reconciliation Core
//!
//! Owns the single logical "now playing" state across the two vendor
//! players. Only one provider is ever driven at a time: starting a track
//! pauses the other provider's player before the play call goes out.
//!
//! Once playback is under way, player events are the source of truth for
//! `is_playing`. Both providers auto-advance through the playlist when a
//! track ends.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::session::PlaybackSession;
use crate::config::{DEFAULT_VOLUME, EMBED_SKIP_DELAY_MS, END_OF_TRACK_TOLERANCE_MS};
use crate::device::DeviceManager;
use crate::errors::{AppError, Result};
use crate::lyrics::NowPlayingUpdate;
use crate::mapper::spotify_track_to_unified;
use crate::models::{PlaybackSnapshot, UnifiedTrack};
use crate::now_playing::NowPlayingBridge;
use crate::opener::UrlOpener;
use crate::players::{
    SdkErrorKind, SdkPlaybackState, SpotifyPlayer, SpotifyPlayerEvent, YoutubePlayer,
    YoutubePlayerEvent, YoutubePlayerFactory, YoutubePlayerState,
};
use crate::providers::{ProviderTag, SpotifyApi};
use crate::spotify::models::{PlaybackState, SpotifyTrack};
use crate::spotify::{format_duration_ms, track_uri};
use crate::storage::{keys, Persistence};

/// Where a started track ended up playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayOutcome {
    /// In one of the dashboard's players.
    Embedded,
    /// Opened in the provider's own site.
    External,
}

#[derive(Debug)]
struct CoreState {
    session: PlaybackSession,
    active_provider: Option<ProviderTag>,
    volume: u8,
    muted: bool,
    last_error: Option<String>,
}

impl Default for CoreState {
    fn default() -> Self {
        Self {
            session: PlaybackSession::default(),
            active_provider: None,
            volume: DEFAULT_VOLUME,
            muted: false,
            last_error: None,
        }
    }
}

pub struct PlaybackCore {
    spotify_api: Arc<dyn SpotifyApi>,
    devices: Arc<DeviceManager>,
    spotify_player: RwLock<Option<Arc<dyn SpotifyPlayer>>>,
    youtube_factory: Arc<dyn YoutubePlayerFactory>,
    /// Built on the first YouTube play.
    youtube_player: tokio::sync::Mutex<Option<Arc<dyn YoutubePlayer>>>,
    persistence: Persistence,
    opener: Arc<dyn UrlOpener>,
    now_playing: Arc<NowPlayingBridge>,
    state: Mutex<CoreState>,
    embed_skip_delay: Duration,
}

impl PlaybackCore {
    pub fn new(
        spotify_api: Arc<dyn SpotifyApi>,
        devices: Arc<DeviceManager>,
        youtube_factory: Arc<dyn YoutubePlayerFactory>,
        persistence: Persistence,
        opener: Arc<dyn UrlOpener>,
        now_playing: Arc<NowPlayingBridge>,
    ) -> Arc<Self> {
        Arc::new(Self {
            spotify_api,
            devices,
            spotify_player: RwLock::new(None),
            youtube_factory,
            youtube_player: tokio::sync::Mutex::new(None),
            persistence,
            opener,
            now_playing,
            state: Mutex::new(CoreState::default()),
            embed_skip_delay: Duration::from_millis(EMBED_SKIP_DELAY_MS),
        })
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.state.lock();
        PlaybackSnapshot {
            current_track: state.session.current_track.clone(),
            playlist: state.session.playlist.clone(),
            is_playing: state.session.is_playing,
            active_provider: state.active_provider,
            volume: state.volume,
            is_muted: state.muted,
            last_error: state.last_error.clone(),
        }
    }

    pub fn devices(&self) -> &Arc<DeviceManager> {
        &self.devices
    }

    /// Called once the Web Playback SDK has connected.
    pub fn attach_spotify_player(&self, player: Arc<dyn SpotifyPlayer>) {
        log::info!("[PlaybackCore] Spotify web player attached");
        *self.spotify_player.write() = Some(player);
    }

    pub fn detach_spotify_player(&self) {
        *self.spotify_player.write() = None;
    }

    fn spotify_player(&self) -> Option<Arc<dyn SpotifyPlayer>> {
        self.spotify_player.read().clone()
    }

    async fn existing_youtube_player(&self) -> Option<Arc<dyn YoutubePlayer>> {
        self.youtube_player.lock().await.clone()
    }

    async fn youtube_player(&self) -> Result<Arc<dyn YoutubePlayer>> {
        let mut slot = self.youtube_player.lock().await;
        if let Some(player) = slot.as_ref() {
            return Ok(Arc::clone(player));
        }
        log::info!("[PlaybackCore] creating YouTube player");
        let player = self.youtube_factory.create().await?;
        *slot = Some(Arc::clone(&player));
        Ok(player)
    }

    /// Make `track` current and start it on its provider.
    ///
    /// The current track stays set when starting fails. Restriction errors
    /// carry the track's external URL as `fallback_url`.
    pub async fn play_track(
        &self,
        track: UnifiedTrack,
        playlist: Option<Vec<UnifiedTrack>>,
    ) -> Result<PlayOutcome> {
        log::info!(
            "[PlaybackCore] play {} '{}' by {}",
            track.source,
            track.name,
            track.artist
        );

        self.set_current(track.clone(), playlist);
        self.silence_other(track.source).await;

        let result = match track.source {
            ProviderTag::Spotify => self.play_spotify(&track).await,
            ProviderTag::Youtube => self.play_youtube(&track).await,
        };

        let mut state = self.state.lock();
        match result {
            Ok(outcome) => {
                if state.session.is_current(&track) {
                    state.session.is_playing = outcome == PlayOutcome::Embedded;
                }
                Ok(outcome)
            }
            Err(e) => {
                let e = with_fallback_url(e, &track);
                log::error!("[PlaybackCore] failed to play '{}': {}", track.name, e);
                // The other player was already paused, so nothing is audible.
                if state.session.is_current(&track) {
                    state.session.is_playing = false;
                }
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn set_current(&self, track: UnifiedTrack, playlist: Option<Vec<UnifiedTrack>>) {
        let update = NowPlayingUpdate::from(&track);
        let changed = {
            let mut state = self.state.lock();
            let changed = !state.session.is_current(&track);
            state.active_provider = Some(track.source);
            state.last_error = None;
            state.session.current_track = Some(track);
            if let Some(playlist) = playlist {
                state.session.playlist = playlist;
            }
            changed
        };
        if changed {
            self.now_playing.submit(update);
        }
    }

    /// Pause whichever player does not belong to `target`.
    async fn silence_other(&self, target: ProviderTag) {
        let result = match target {
            ProviderTag::Spotify => match self.existing_youtube_player().await {
                Some(player) => player.pause().await,
                None => Ok(()),
            },
            ProviderTag::Youtube => match self.spotify_player() {
                Some(player) => player.pause().await,
                None => Ok(()),
            },
        };
        if let Err(e) = result {
            log::warn!("[PlaybackCore] failed to pause {}: {}", target.other(), e);
        }
    }

    async fn play_spotify(&self, track: &UnifiedTrack) -> Result<PlayOutcome> {
        let device_id = self.devices.device_id().await?;
        self.spotify_api
            .start_playback(device_id.as_deref(), &[track_uri(&track.id)])
            .await?;
        Ok(PlayOutcome::Embedded)
    }

    async fn play_youtube(&self, track: &UnifiedTrack) -> Result<PlayOutcome> {
        if self
            .persistence
            .get_flag(&keys::embed_failed(&track.id))
            .await?
        {
            log::info!(
                "[PlaybackCore] {} cannot be embedded, opening externally",
                track.id
            );
            self.opener.open(&track.external_url)?;
            return Ok(PlayOutcome::External);
        }

        let player = self.youtube_player().await?;
        player.load_and_play(&track.id).await?;
        Ok(PlayOutcome::Embedded)
    }

    /// `None` when there is nothing to advance to.
    pub async fn play_next(&self) -> Result<Option<PlayOutcome>> {
        let next = self.state.lock().session.next_track();
        match next {
            Some(track) => self.play_track(track, None).await.map(Some),
            None => {
                log::debug!("[PlaybackCore] no next track");
                Ok(None)
            }
        }
    }

    pub async fn play_previous(&self) -> Result<Option<PlayOutcome>> {
        let prev = self.state.lock().session.prev_track();
        match prev {
            Some(track) => self.play_track(track, None).await.map(Some),
            None => {
                log::debug!("[PlaybackCore] no previous track");
                Ok(None)
            }
        }
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        let (source, playing) = {
            let state = self.state.lock();
            match state.session.current_track.as_ref() {
                Some(track) => (track.source, state.session.is_playing),
                None => return Ok(()),
            }
        };

        match (source, playing) {
            (ProviderTag::Spotify, true) => self.pause_spotify().await?,
            (ProviderTag::Spotify, false) => self.resume_spotify().await?,
            (ProviderTag::Youtube, true) => self.live_youtube_player().await?.pause().await?,
            (ProviderTag::Youtube, false) => self.live_youtube_player().await?.play().await?,
        }

        self.state.lock().session.is_playing = !playing;
        Ok(())
    }

    async fn live_youtube_player(&self) -> Result<Arc<dyn YoutubePlayer>> {
        self.existing_youtube_player()
            .await
            .ok_or_else(|| AppError::Player("YouTube player not ready".to_string()))
    }

    async fn pause_spotify(&self) -> Result<()> {
        if let Some(player) = self.spotify_player() {
            return player.pause().await;
        }
        let device_id = self.devices.device_id().await?;
        self.spotify_api.pause_playback(device_id.as_deref()).await
    }

    /// Web API resume first, SDK resume if that fails.
    async fn resume_spotify(&self) -> Result<()> {
        let device_id = self.devices.device_id().await?;
        match self.spotify_api.resume_playback(device_id.as_deref()).await {
            Ok(()) => Ok(()),
            Err(e) => match self.spotify_player() {
                Some(player) => {
                    log::warn!("[PlaybackCore] API resume failed ({}), using web player", e);
                    player.resume().await
                }
                None => Err(e),
            },
        }
    }

    pub async fn set_volume(&self, level: u8) -> Result<()> {
        let level = level.min(100);
        let source = {
            let mut state = self.state.lock();
            state.volume = level;
            state.muted = false;
            state.session.current_track.as_ref().map(|t| t.source)
        };

        match source {
            Some(ProviderTag::Spotify) => self.apply_spotify_volume(level).await,
            Some(ProviderTag::Youtube) => match self.existing_youtube_player().await {
                Some(player) => {
                    player.unmute().await?;
                    player.set_volume(level).await
                }
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    /// Returns whether audio is muted afterwards. Unmuting restores the
    /// level set before muting.
    pub async fn toggle_mute(&self) -> Result<bool> {
        let (source, muted, volume) = {
            let mut state = self.state.lock();
            state.muted = !state.muted;
            (
                state.session.current_track.as_ref().map(|t| t.source),
                state.muted,
                state.volume,
            )
        };

        match source {
            Some(ProviderTag::Spotify) => {
                self.apply_spotify_volume(if muted { 0 } else { volume })
                    .await?
            }
            Some(ProviderTag::Youtube) => {
                if let Some(player) = self.existing_youtube_player().await {
                    if muted {
                        player.mute().await?;
                    } else {
                        player.unmute().await?;
                        player.set_volume(volume).await?;
                    }
                }
            }
            None => {}
        }
        Ok(muted)
    }

    async fn apply_spotify_volume(&self, level: u8) -> Result<()> {
        if let Some(player) = self.spotify_player() {
            return player.set_volume(f32::from(level) / 100.0).await;
        }
        let device_id = self.devices.device_id().await?;
        self.spotify_api.set_volume(level, device_id.as_deref()).await
    }

    pub async fn handle_spotify_event(&self, event: SpotifyPlayerEvent) -> Result<()> {
        match event {
            SpotifyPlayerEvent::Ready { device_id } => self.devices.set_device_id(&device_id).await,
            SpotifyPlayerEvent::NotReady { device_id } => self.devices.device_gone(&device_id).await,
            SpotifyPlayerEvent::Error { kind, message } => {
                log::error!("[PlaybackCore] Spotify player error ({:?}): {}", kind, message);
                if kind == SdkErrorKind::Account {
                    log::warn!("[PlaybackCore] Spotify account cannot use the web player");
                }
                self.state.lock().last_error = Some(message);
                Ok(())
            }
            SpotifyPlayerEvent::StateChanged(sdk_state) => self.on_spotify_state(sdk_state).await,
        }
    }

    async fn on_spotify_state(&self, sdk_state: SdkPlaybackState) -> Result<()> {
        if !self.is_active(ProviderTag::Spotify) {
            return Ok(());
        }

        if let Some(ref track) = sdk_state.track {
            if self.adopt_spotify_track(track) {
                self.state.lock().session.is_playing = !sdk_state.paused;
                return Ok(());
            }
        }

        let ended = sdk_state.paused
            && sdk_state.duration_ms > 0
            && sdk_state.position_ms + END_OF_TRACK_TOLERANCE_MS >= sdk_state.duration_ms;

        let was_playing = {
            let mut state = self.state.lock();
            let was_playing = state.session.is_playing;
            state.session.is_playing = !sdk_state.paused;
            was_playing
        };

        if ended && was_playing {
            log::info!("[PlaybackCore] Spotify track ended, advancing");
            self.play_next().await?;
        }
        Ok(())
    }

    /// Fold a polled `/me/player` state into the session.
    pub fn apply_remote_playback(&self, remote: Option<PlaybackState>) {
        if !self.is_active(ProviderTag::Spotify) {
            return;
        }
        let Some(remote) = remote else {
            return;
        };
        let at_end = match remote.item {
            Some(ref track) => {
                self.adopt_spotify_track(track);
                track.duration_ms > 0
                    && remote.progress_ms.unwrap_or(0) + END_OF_TRACK_TOLERANCE_MS
                        >= track.duration_ms
            }
            None => false,
        };
        // A paused-at-end poll is left for the SDK's end-of-track event,
        // which only advances while the session still counts as playing.
        if !remote.is_playing && at_end {
            return;
        }
        self.state.lock().session.is_playing = remote.is_playing;
    }

    /// Make a track started outside the dashboard current. Returns whether
    /// the current track changed.
    fn adopt_spotify_track(&self, track: &SpotifyTrack) -> bool {
        let Some(unified) =
            spotify_track_to_unified(track, format_duration_ms(track.duration_ms).into())
        else {
            return false;
        };
        if self.state.lock().session.is_current(&unified) {
            return false;
        }

        log::info!(
            "[PlaybackCore] Spotify switched to '{}' outside the dashboard",
            unified.name
        );
        self.set_current(unified, None);
        true
    }

    fn is_active(&self, provider: ProviderTag) -> bool {
        self.state.lock().active_provider == Some(provider)
    }

    pub async fn handle_youtube_event(self: &Arc<Self>, event: YoutubePlayerEvent) -> Result<()> {
        if !self.is_active(ProviderTag::Youtube) {
            return Ok(());
        }

        match event {
            YoutubePlayerEvent::Ready => {
                log::debug!("[PlaybackCore] YouTube player ready");
                Ok(())
            }
            YoutubePlayerEvent::StateChanged(player_state) => match player_state {
                YoutubePlayerState::Playing => {
                    self.state.lock().session.is_playing = true;
                    Ok(())
                }
                YoutubePlayerState::Paused => {
                    self.state.lock().session.is_playing = false;
                    Ok(())
                }
                YoutubePlayerState::Ended => {
                    self.state.lock().session.is_playing = false;
                    log::info!("[PlaybackCore] YouTube video ended, advancing");
                    self.play_next().await.map(|_| ())
                }
                _ => Ok(()),
            },
            YoutubePlayerEvent::Error(code) if code.is_embed_restriction() => {
                self.on_embed_refused().await
            }
            YoutubePlayerEvent::Error(code) => {
                log::error!(
                    "[PlaybackCore] YouTube player error {}: {}",
                    code.code(),
                    code.describe()
                );
                let mut state = self.state.lock();
                state.session.is_playing = false;
                state.last_error = Some(code.describe().to_string());
                Ok(())
            }
        }
    }

    /// Remember the refusal, open the video on YouTube, and move on after a
    /// short delay when there is anything to move on to.
    async fn on_embed_refused(self: &Arc<Self>) -> Result<()> {
        let (track, playlist_len) = {
            let state = self.state.lock();
            match state.session.current_track.clone() {
                Some(track) => (track, state.session.playlist.len()),
                None => return Ok(()),
            }
        };

        log::warn!("[PlaybackCore] {} refused embedding", track.id);
        self.persistence
            .set_json(&keys::embed_failed(&track.id), &true)
            .await?;

        {
            let mut state = self.state.lock();
            state.session.is_playing = false;
            state.last_error = Some(AppError::EmbeddingRestricted(track.id.clone()).to_string());
        }

        if let Err(e) = self.opener.open(&track.external_url) {
            log::warn!("[PlaybackCore] could not open {}: {}", track.external_url, e);
        }

        if playlist_len > 1 {
            let this = Arc::clone(self);
            let delay = self.embed_skip_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if !this.state.lock().session.is_current(&track) {
                    return;
                }
                if let Err(e) = this.play_next().await {
                    log::warn!("[PlaybackCore] auto-advance after embed refusal failed: {}", e);
                }
            });
        }
        Ok(())
    }

    /// Pause both players, drop the web player handle and forget the
    /// session. Used on logout.
    pub async fn shutdown(&self) {
        if let Some(player) = self.existing_youtube_player().await {
            if let Err(e) = player.pause().await {
                log::warn!("[PlaybackCore] failed to pause YouTube player: {}", e);
            }
        }
        if let Some(player) = self.spotify_player() {
            if let Err(e) = player.pause().await {
                log::warn!("[PlaybackCore] failed to pause Spotify web player: {}", e);
            }
        }
        self.detach_spotify_player();
        self.reset();
    }

    /// Forget the session.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let volume = state.volume;
        *state = CoreState {
            volume,
            ..CoreState::default()
        };
    }
}

fn with_fallback_url(error: AppError, track: &UnifiedTrack) -> AppError {
    match error {
        AppError::PlaybackRestricted {
            message,
            fallback_url,
        } if fallback_url.is_empty() => AppError::PlaybackRestricted {
            message,
            fallback_url: track.external_url.clone(),
        },
        other => other,
    }
}
