use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::classifier::is_music;
use crate::config::{MUSIC_RATIO_THRESHOLD, PLAYLIST_SAMPLE_SIZE};
use crate::errors::Result;
use crate::providers::YoutubeApi;

/// Decides whether a playlist is mostly music by sampling its first items.
/// Verdicts are kept for the lifetime of the classifier.
pub struct PlaylistMusicClassifier {
    api: Arc<dyn YoutubeApi>,
    cache: RwLock<HashMap<String, bool>>,
}

impl PlaylistMusicClassifier {
    pub fn new(api: Arc<dyn YoutubeApi>) -> Self {
        Self {
            api,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn is_music_playlist(&self, playlist_id: &str) -> Result<bool> {
        if let Some(&verdict) = self.cache.read().get(playlist_id) {
            return Ok(verdict);
        }

        let sample = self
            .api
            .playlist_items(playlist_id, None, PLAYLIST_SAMPLE_SIZE)
            .await?;

        let valid: Vec<_> = sample.items.iter().filter(|i| i.is_available()).collect();
        let verdict = if valid.is_empty() {
            false
        } else {
            let music = valid.iter().filter(|i| is_music(**i)).count();
            music as f64 / valid.len() as f64 >= MUSIC_RATIO_THRESHOLD
        };

        log::debug!(
            "Playlist {} classified as {} ({} valid items sampled)",
            playlist_id,
            if verdict { "music" } else { "non-music" },
            valid.len()
        );
        self.cache.write().insert(playlist_id.to_string(), verdict);
        Ok(verdict)
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}
