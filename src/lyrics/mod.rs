//! Client for the lyrics/chat backend.
//!
//! The backend keeps one "now playing" record that its lyrics and chat
//! features read from. The dashboard pushes every new current track to it
//! and polls it back.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::UnifiedTrack;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NowPlayingUpdate {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
}

impl From<&UnifiedTrack> for NowPlayingUpdate {
    fn from(track: &UnifiedTrack) -> Self {
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
        }
    }
}

/// What the backend currently believes is playing.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct NowPlayingRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub lyrics: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ChatResponse {
    answer: Option<String>,
    error: Option<String>,
}

#[async_trait]
pub trait LyricsBackend: Send + Sync {
    /// `None` when nothing is playing.
    async fn get_now_playing(&self) -> Result<Option<NowPlayingRecord>>;
    async fn update_now_playing(&self, update: &NowPlayingUpdate) -> Result<()>;
    async fn send_chat_message(&self, query: &str) -> Result<String>;
}

pub struct HttpLyricsBackend {
    http: Client,
    base_url: String,
}

impl HttpLyricsBackend {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl LyricsBackend for HttpLyricsBackend {
    async fn get_now_playing(&self) -> Result<Option<NowPlayingRecord>> {
        let response = self.http.get(self.url("/api/now-playing")).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                let body = response.text().await.unwrap_or_default();
                log::warn!("Backend now-playing fetch failed ({}): {}", status, body);
                Err(AppError::Network(format!("HTTP {} - {}", status, body)))
            }
        }
    }

    async fn update_now_playing(&self, update: &NowPlayingUpdate) -> Result<()> {
        log::debug!("Sending now playing to backend: {} - {}", update.artist, update.name);

        let response = self
            .http
            .post(self.url("/api/now-playing"))
            .json(update)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Network(format!("HTTP {} - {}", status, body)));
        }
        Ok(())
    }

    async fn send_chat_message(&self, query: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/chat"))
            .json(&ChatRequest { query })
            .send()
            .await?;

        let status = response.status();
        let body: ChatResponse = response.json().await.unwrap_or_default();

        match (body.answer, body.error) {
            (Some(answer), _) if status.is_success() => Ok(answer),
            (_, Some(error)) => Err(AppError::Network(error)),
            _ => Err(AppError::Network(format!(
                "Chat request failed with HTTP {}",
                status
            ))),
        }
    }
}
