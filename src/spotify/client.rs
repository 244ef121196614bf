use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use super::models::*;
use crate::auth::{OAuthSession, SPOTIFY_TOKEN_KEYS};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::providers::SpotifyApi;
use crate::rate_limiter::RateLimiter;
use crate::storage::Persistence;

const PLAYLIST_PAGE_LIMIT: &str = "100";

pub struct SpotifyClient {
    http: Client,
    api_url: String,
    auth: OAuthSession,
    limiter: Arc<RateLimiter>,
}

impl SpotifyClient {
    pub fn new(
        config: &AppConfig,
        persistence: Persistence,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        let auth = OAuthSession::new(
            "spotify",
            persistence,
            SPOTIFY_TOKEN_KEYS,
            format!(
                "{}/api/token",
                config.spotify_accounts_url.trim_end_matches('/')
            ),
            config.spotify_client_id.clone(),
            None,
            http.clone(),
        );

        Ok(Self {
            http,
            api_url: config.spotify_api_url.trim_end_matches('/').to_string(),
            auth,
            limiter,
        })
    }

    pub fn auth(&self) -> &OAuthSession {
        &self.auth
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn build_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        // Pagination hands back absolute `next` URLs.
        let base = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.api_url, path)
        };
        let url = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        url.map_err(|e| AppError::Network(format!("URL parse error: {}", e)))
    }

    /// Authenticated request with one refresh-and-retry on 401.
    async fn make_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<Value>,
        operation: &str,
    ) -> Result<Option<Value>> {
        let url = self.build_url(path, params)?;
        let token = self.auth.fresh_access_token().await?;

        match self
            .try_request(method.clone(), url.clone(), body.clone(), &token, operation)
            .await
        {
            Err(AppError::Auth(msg)) => {
                log::info!(
                    "[spotify] {} rejected ({}), refreshing token and retrying",
                    operation,
                    msg
                );
                let token = self.auth.refresh().await?;
                self.try_request(method, url, body, &token, operation).await
            }
            other => other,
        }
    }

    async fn try_request(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        token: &str,
        operation: &str,
    ) -> Result<Option<Value>> {
        log::debug!("[spotify] {} {} ({})", method, url, operation);

        let mut request = self.http.request(method, url).bearer_auth(token);
        request = match body {
            Some(body) => request.json(&body),
            // The player endpoints reject PUT/POST without a length header.
            None => request.header(reqwest::header::CONTENT_LENGTH, 0),
        };

        self.limiter
            .enqueue(|| async move {
                let response = request.send().await?;
                Self::handle_response(response, operation).await
            })
            .await
    }

    async fn handle_response(response: Response, operation: &str) -> Result<Option<Value>> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        // Body reads count against the request timeout too.
        let text = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            log::warn!("[spotify] rate limited during {}", operation);
            return Err(AppError::RateLimited(format!(
                "retry after {}s",
                retry_after.unwrap_or_else(|| "?".to_string())
            )));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::Auth(format!("{} returned 401", operation)));
        }

        if !status.is_success() {
            return Err(Self::classify_failure(status, &text, operation));
        }

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::Parse(format!("JSON error in {}: {}", operation, e)))?;
        Ok(Some(data))
    }

    fn classify_failure(status: StatusCode, text: &str, operation: &str) -> AppError {
        let detail = serde_json::from_str::<ApiErrorBody>(text)
            .map(|b| b.error)
            .ok();
        let message = detail
            .as_ref()
            .map(|d| d.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| text.to_string());
        let reason = detail.and_then(|d| d.reason).unwrap_or_default();

        log::warn!(
            "[spotify] {} failed ({}): {} {}",
            operation,
            status,
            reason,
            message
        );

        match status {
            StatusCode::FORBIDDEN
                if reason == "PREMIUM_REQUIRED"
                    || message.to_lowercase().contains("restrict")
                    || message.to_lowercase().contains("premium") =>
            {
                AppError::PlaybackRestricted {
                    message: format!(
                        "Spotify refused playback: {}. Spotify Premium is required to play inside the dashboard.",
                        message
                    ),
                    fallback_url: String::new(),
                }
            }
            StatusCode::NOT_FOUND if reason == "NO_ACTIVE_DEVICE" => {
                AppError::Player("No active Spotify device".to_string())
            }
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            _ => AppError::Network(format!("HTTP {} - {}", status, message)),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &str,
    ) -> Result<T> {
        let data = self
            .make_request(Method::GET, path, params, None, operation)
            .await?
            .ok_or_else(|| AppError::Parse(format!("{} returned no body", operation)))?;
        serde_json::from_value(data).map_err(|e| {
            log::error!("[spotify] failed to deserialize {}: {}", operation, e);
            AppError::from(e)
        })
    }

    fn device_param(device_id: Option<&str>) -> Vec<(&'static str, String)> {
        device_id
            .map(|id| vec![("device_id", id.to_string())])
            .unwrap_or_default()
    }

    async fn player_command(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
        device_id: Option<&str>,
        body: Option<Value>,
        operation: &str,
    ) -> Result<()> {
        params.extend(Self::device_param(device_id));
        self.make_request(method, path, &params, body, operation)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SpotifyApi for SpotifyClient {
    async fn start_playback(&self, device_id: Option<&str>, uris: &[String]) -> Result<()> {
        self.player_command(
            Method::PUT,
            "/me/player/play",
            Vec::new(),
            device_id,
            Some(json!({ "uris": uris })),
            "start_playback",
        )
        .await
    }

    async fn pause_playback(&self, device_id: Option<&str>) -> Result<()> {
        self.player_command(
            Method::PUT,
            "/me/player/pause",
            Vec::new(),
            device_id,
            None,
            "pause_playback",
        )
        .await
    }

    async fn resume_playback(&self, device_id: Option<&str>) -> Result<()> {
        self.player_command(
            Method::PUT,
            "/me/player/play",
            Vec::new(),
            device_id,
            None,
            "resume_playback",
        )
        .await
    }

    async fn set_volume(&self, percent: u8, device_id: Option<&str>) -> Result<()> {
        self.player_command(
            Method::PUT,
            "/me/player/volume",
            vec![("volume_percent", percent.min(100).to_string())],
            device_id,
            None,
            "set_volume",
        )
        .await
    }

    async fn current_playback(&self) -> Result<Option<PlaybackState>> {
        // 204 means nothing is playing anywhere.
        match self
            .make_request(Method::GET, "/me/player", &[], None, "current_playback")
            .await?
        {
            Some(data) => Ok(Some(serde_json::from_value(data)?)),
            None => Ok(None),
        }
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let res: DevicesResponse = self.get_json("/me/player/devices", &[], "devices").await?;
        Ok(res.devices)
    }

    async fn skip_next(&self, device_id: Option<&str>) -> Result<()> {
        self.player_command(
            Method::POST,
            "/me/player/next",
            Vec::new(),
            device_id,
            None,
            "skip_next",
        )
        .await
    }

    async fn skip_previous(&self, device_id: Option<&str>) -> Result<()> {
        self.player_command(
            Method::POST,
            "/me/player/previous",
            Vec::new(),
            device_id,
            None,
            "skip_previous",
        )
        .await
    }

    async fn seek(&self, position_ms: u64, device_id: Option<&str>) -> Result<()> {
        self.player_command(
            Method::PUT,
            "/me/player/seek",
            vec![("position_ms", position_ms.to_string())],
            device_id,
            None,
            "seek",
        )
        .await
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<SpotifyTrack>> {
        let res: SearchResponse = self
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", "track".to_string()),
                    ("limit", limit.to_string()),
                ],
                "search_tracks",
            )
            .await?;
        Ok(res.tracks.map(|p| p.items).unwrap_or_default())
    }

    async fn current_user_playlists(&self, limit: u32) -> Result<Vec<SpotifyPlaylist>> {
        let page: Paging<SpotifyPlaylist> = self
            .get_json(
                "/me/playlists",
                &[("limit", limit.to_string())],
                "current_user_playlists",
            )
            .await?;
        Ok(page.items)
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<SpotifyTrack>> {
        let first_path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        let mut page: Paging<PlaylistTrackItem> = self
            .get_json(
                &first_path,
                &[("limit", PLAYLIST_PAGE_LIMIT.to_string())],
                "playlist_tracks",
            )
            .await?;

        let mut tracks = Vec::new();
        loop {
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .filter(|t| t.id.is_some()),
            );
            match page.next {
                Some(next) => {
                    page = self.get_json(&next, &[], "playlist_tracks").await?;
                }
                None => break,
            }
        }

        log::debug!(
            "[spotify] playlist {} has {} playable tracks",
            playlist_id,
            tracks.len()
        );
        Ok(tracks)
    }

    async fn top_artists(&self, limit: u32) -> Result<Vec<SpotifyArtist>> {
        let page: Paging<SpotifyArtist> = self
            .get_json(
                "/me/top/artists",
                &[("limit", limit.to_string())],
                "top_artists",
            )
            .await?;
        Ok(page.items)
    }

    async fn recently_played(&self, limit: u32) -> Result<Vec<SpotifyTrack>> {
        let page: Paging<PlayHistory> = self
            .get_json(
                "/me/player/recently-played",
                &[("limit", limit.to_string())],
                "recently_played",
            )
            .await?;
        Ok(page.items.into_iter().map(|h| h.track).collect())
    }

    async fn saved_tracks(&self, limit: u32) -> Result<Vec<SpotifyTrack>> {
        let page: Paging<SavedTrack> = self
            .get_json("/me/tracks", &[("limit", limit.to_string())], "saved_tracks")
            .await?;
        Ok(page.items.into_iter().map(|s| s.track).collect())
    }

    async fn get_track(&self, track_id: &str) -> Result<SpotifyTrack> {
        self.get_json(
            &format!("/tracks/{}", urlencoding::encode(track_id)),
            &[],
            "get_track",
        )
        .await
    }

    async fn get_album(&self, album_id: &str) -> Result<SpotifyAlbum> {
        self.get_json(
            &format!("/albums/{}", urlencoding::encode(album_id)),
            &[],
            "get_album",
        )
        .await
    }

    async fn get_playlist(&self, playlist_id: &str) -> Result<SpotifyPlaylist> {
        self.get_json(
            &format!("/playlists/{}", urlencoding::encode(playlist_id)),
            &[],
            "get_playlist",
        )
        .await
    }
}
