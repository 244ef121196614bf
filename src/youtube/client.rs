use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::models::*;
use crate::auth::{OAuthSession, YOUTUBE_TOKEN_KEYS};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::providers::YoutubeApi;
use crate::rate_limiter::RateLimiter;
use crate::storage::Persistence;

/// YouTube's category id for music.
const MUSIC_CATEGORY_ID: &str = "10";

pub struct YoutubeClient {
    http: Client,
    api_url: String,
    auth: OAuthSession,
    limiter: Arc<RateLimiter>,
}

impl YoutubeClient {
    pub fn new(
        config: &AppConfig,
        persistence: Persistence,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        let auth = OAuthSession::new(
            "youtube",
            persistence,
            YOUTUBE_TOKEN_KEYS,
            config.youtube_token_url.clone(),
            config.youtube_client_id.clone(),
            config.youtube_client_secret.clone(),
            http.clone(),
        );

        Ok(Self {
            http,
            api_url: config.youtube_api_url.trim_end_matches('/').to_string(),
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

    /// Explicit refresh. Requests do not retry through this on 401.
    pub async fn refresh_token(&self) -> Result<String> {
        self.auth.refresh().await
    }

    async fn make_request(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &str,
    ) -> Result<Value> {
        let url = Url::parse_with_params(&format!("{}{}", self.api_url, path), params)
            .map_err(|e| AppError::Network(format!("URL parse error: {}", e)))?;
        let token = self.auth.access_token().await?;

        log::debug!("[youtube] GET {} ({})", url, operation);

        let request = self.http.get(url).bearer_auth(token);
        let result = self
            .limiter
            .enqueue(|| async move {
                let response = request.send().await?;
                Self::handle_response(response, operation).await
            })
            .await;

        if let Err(AppError::Auth(ref msg)) = result {
            log::warn!("[youtube] {} unauthorized: {}", operation, msg);
            self.auth.clear_session().await?;
            return Err(AppError::Auth(
                "YouTube session expired, please log in again".to_string(),
            ));
        }
        result
    }

    async fn handle_response(response: Response, operation: &str) -> Result<Value> {
        let status = response.status();
        // Body reads count against the request timeout too.
        let text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::Auth(format!("{} returned 401", operation)));
        }

        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN
                && (text.contains("quotaExceeded") || text.contains("rateLimitExceeded")))
        {
            log::warn!("[youtube] quota or rate limit hit during {}", operation);
            return Err(AppError::RateLimited(format!("{} ({})", operation, status)));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("{}: {}", operation, text)));
        }

        if !status.is_success() {
            log::warn!("[youtube] {} failed ({}): {}", operation, status, text);
            return Err(AppError::Network(format!("HTTP {} - {}", status, text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| AppError::Parse(format!("JSON error in {}: {}", operation, e)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &str,
    ) -> Result<T> {
        let data = self.make_request(path, params, operation).await?;
        serde_json::from_value(data).map_err(|e| {
            log::error!("[youtube] failed to deserialize {}: {}", operation, e);
            AppError::from(e)
        })
    }

    fn page_params(
        mut params: Vec<(&'static str, String)>,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Vec<(&'static str, String)> {
        params.push(("maxResults", max_results.min(50).to_string()));
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        params
    }
}

#[async_trait]
impl YoutubeApi for YoutubeClient {
    async fn liked_videos(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<YoutubeVideo>> {
        let params = Self::page_params(
            vec![
                ("part", "snippet,contentDetails".to_string()),
                ("myRating", "like".to_string()),
            ],
            page_token,
            max_results,
        );
        self.get_json("/videos", &params, "liked_videos").await
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<YoutubePlaylistItem>> {
        let params = Self::page_params(
            vec![
                ("part", "snippet".to_string()),
                ("playlistId", playlist_id.to_string()),
            ],
            page_token,
            max_results,
        );
        self.get_json("/playlistItems", &params, "playlist_items")
            .await
    }

    async fn my_playlists(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<ListResponse<YoutubePlaylist>> {
        let params = Self::page_params(
            vec![
                ("part", "snippet,contentDetails,status".to_string()),
                ("mine", "true".to_string()),
            ],
            page_token,
            max_results,
        );
        self.get_json("/playlists", &params, "my_playlists").await
    }

    async fn search_videos(&self, query: &str, max_results: u32) -> Result<Vec<YoutubeVideo>> {
        let params = Self::page_params(
            vec![
                ("part", "snippet".to_string()),
                ("type", "video".to_string()),
                ("videoCategoryId", MUSIC_CATEGORY_ID.to_string()),
                ("q", query.to_string()),
            ],
            None,
            max_results,
        );
        let res: ListResponse<SearchResult> =
            self.get_json("/search", &params, "search_videos").await?;
        Ok(res
            .items
            .into_iter()
            .filter_map(SearchResult::into_video)
            .collect())
    }
}
