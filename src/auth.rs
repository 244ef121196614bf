//! Persisted OAuth credentials and the refresh-token exchange.
//!
//! The login flows themselves live in the UI; this module only reads what
//! they stored, refreshes access tokens, and clears sessions.

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::{AppError, Result};
use crate::storage::{keys, Persistence};

/// Refresh this long before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Copy)]
pub struct TokenKeys {
    pub access_token: &'static str,
    pub refresh_token: &'static str,
    pub expires_at: &'static str,
    /// Everything removed when the session ends.
    pub session: &'static [&'static str],
}

pub const SPOTIFY_TOKEN_KEYS: TokenKeys = TokenKeys {
    access_token: keys::SPOTIFY_ACCESS_TOKEN,
    refresh_token: keys::SPOTIFY_REFRESH_TOKEN,
    expires_at: keys::SPOTIFY_TOKEN_EXPIRES_AT,
    session: keys::SPOTIFY_SESSION_KEYS,
};

pub const YOUTUBE_TOKEN_KEYS: TokenKeys = TokenKeys {
    access_token: keys::YOUTUBE_ACCESS_TOKEN,
    refresh_token: keys::YOUTUBE_REFRESH_TOKEN,
    expires_at: keys::YOUTUBE_TOKEN_EXPIRES_AT,
    session: keys::YOUTUBE_SESSION_KEYS,
};

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

pub struct OAuthSession {
    provider: &'static str,
    persistence: Persistence,
    keys: TokenKeys,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    http: Client,
}

impl OAuthSession {
    pub fn new(
        provider: &'static str,
        persistence: Persistence,
        keys: TokenKeys,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        http: Client,
    ) -> Self {
        Self {
            provider,
            persistence,
            keys,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            http,
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        self.persistence
            .get_string(self.keys.access_token)
            .await?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Auth(format!("Not logged in to {}", self.provider)))
    }

    pub async fn is_logged_in(&self) -> bool {
        self.access_token().await.is_ok()
    }

    pub async fn is_expired(&self) -> Result<bool> {
        let expires_at = self.persistence.get_string(self.keys.expires_at).await?;
        let Some(expires_at) = expires_at else {
            return Ok(false);
        };
        match DateTime::parse_from_rfc3339(&expires_at) {
            Ok(at) => Ok(Utc::now() + TimeDelta::seconds(EXPIRY_MARGIN_SECS) >= at),
            Err(_) => Ok(true),
        }
    }

    pub async fn store_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_in_secs: i64,
    ) -> Result<()> {
        let expires_at = Utc::now() + TimeDelta::seconds(expires_in_secs);
        self.persistence
            .set_string(self.keys.access_token, access_token)
            .await?;
        if let Some(refresh) = refresh_token {
            self.persistence
                .set_string(self.keys.refresh_token, refresh)
                .await?;
        }
        self.persistence
            .set_string(self.keys.expires_at, &expires_at.to_rfc3339())
            .await
    }

    /// Current token, refreshed first when it is about to expire.
    pub async fn fresh_access_token(&self) -> Result<String> {
        if self.is_expired().await? {
            log::info!("[{}] access token expired, refreshing", self.provider);
            return self.refresh().await;
        }
        self.access_token().await
    }

    /// Exchange the stored refresh token. Any failure ends the session.
    pub async fn refresh(&self) -> Result<String> {
        match self.exchange_refresh_token().await {
            Ok(token) => Ok(token),
            Err(e) => {
                log::warn!("[{}] token refresh failed: {}", self.provider, e);
                self.clear_session().await?;
                Err(AppError::Auth(format!(
                    "{} session expired, please log in again",
                    self.provider
                )))
            }
        }
    }

    async fn exchange_refresh_token(&self) -> Result<String> {
        let refresh_token = self
            .persistence
            .get_string(self.keys.refresh_token)
            .await?
            .ok_or_else(|| AppError::Auth("No refresh token stored".to_string()))?;

        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.clone()),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!("HTTP {} - {}", status, body)));
        }

        let grant: RefreshResponse = response.json().await?;
        self.store_tokens(
            &grant.access_token,
            grant.refresh_token.as_deref(),
            grant.expires_in.unwrap_or(3600),
        )
        .await?;

        log::info!("[{}] access token refreshed", self.provider);
        Ok(grant.access_token)
    }

    pub async fn clear_session(&self) -> Result<()> {
        log::info!("[{}] clearing local session", self.provider);
        self.persistence.remove_all(self.keys.session).await
    }
}
