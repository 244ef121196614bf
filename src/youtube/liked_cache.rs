//! In-memory cache of the user's liked music videos.
//!
//! ```text
//! cold (empty/expired) -> first page, spawn fill if more pages
//! warm, incomplete     -> cached items, spawn fill if none running
//! warm, complete       -> cached items
//! ```
//!
//! The fill walks the remaining pages in the background with a delay
//! between requests so the quota-limited API is not hammered.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::classifier::is_music;
use super::models::YoutubeVideo;
use crate::config::{
    BACKGROUND_PAGE_DELAY_MS, LIKED_CACHE_TTL_SECONDS, LIKED_PAGE_SIZE, MAX_BACKGROUND_PAGES,
};
use crate::errors::{AppError, Result};
use crate::providers::YoutubeApi;

#[derive(Debug, Clone, PartialEq)]
pub struct LikedSnapshot {
    pub items: Vec<YoutubeVideo>,
    pub is_complete: bool,
}

#[derive(Debug)]
struct CacheEntry {
    data: Vec<YoutubeVideo>,
    fetched_at: Instant,
    is_complete: bool,
    next_page_token: Option<String>,
}

impl CacheEntry {
    fn snapshot(&self) -> LikedSnapshot {
        LikedSnapshot {
            items: self.data.clone(),
            is_complete: self.is_complete,
        }
    }

    /// Appends music items not already cached.
    fn extend(&mut self, videos: Vec<YoutubeVideo>, next_page_token: Option<String>) -> usize {
        let mut seen: HashSet<String> = self.data.iter().map(|v| v.id.clone()).collect();
        let before = self.data.len();
        self.data.extend(
            videos
                .into_iter()
                .filter(|v| is_music(v))
                .filter(|v| seen.insert(v.id.clone())),
        );
        self.is_complete = next_page_token.is_none();
        self.next_page_token = next_page_token;
        self.data.len() - before
    }
}

pub struct LikedContentCache {
    api: Arc<dyn YoutubeApi>,
    entry: Mutex<Option<CacheEntry>>,
    /// Held by a cold start and by a running fill so they never overlap.
    load_gate: tokio::sync::Mutex<()>,
    fill_running: AtomicBool,
    fill_handle: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
    ttl: Duration,
    page_delay: Duration,
    max_pages: usize,
}

impl LikedContentCache {
    pub fn new(api: Arc<dyn YoutubeApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            entry: Mutex::new(None),
            load_gate: tokio::sync::Mutex::new(()),
            fill_running: AtomicBool::new(false),
            fill_handle: Mutex::new(None),
            generation: AtomicU64::new(0),
            ttl: Duration::from_secs(LIKED_CACHE_TTL_SECONDS),
            page_delay: Duration::from_millis(BACKGROUND_PAGE_DELAY_MS),
            max_pages: MAX_BACKGROUND_PAGES,
        })
    }

    pub fn is_filling(&self) -> bool {
        self.fill_running.load(Ordering::SeqCst)
    }

    /// Cached contents when present and not expired, without fetching.
    pub fn cached(&self) -> Option<LikedSnapshot> {
        let entry = self.entry.lock();
        entry
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(CacheEntry::snapshot)
    }

    pub async fn get_liked_videos_for_search(self: &Arc<Self>) -> Result<LikedSnapshot> {
        if let Some(snapshot) = self.warm() {
            return Ok(snapshot);
        }

        let gate = self.load_gate.lock().await;
        // Another caller may have loaded while we waited.
        if let Some(snapshot) = self.warm() {
            return Ok(snapshot);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        log::info!("[LikedCache] cold start, fetching first page");
        let page = self.api.liked_videos(None, LIKED_PAGE_SIZE).await?;

        if generation != self.generation.load(Ordering::SeqCst) {
            return Err(AppError::Cancelled(
                "Liked videos cache was invalidated".to_string(),
            ));
        }

        let mut entry = CacheEntry {
            data: Vec::new(),
            fetched_at: Instant::now(),
            is_complete: false,
            next_page_token: None,
        };
        entry.extend(page.items, page.next_page_token);
        let snapshot = entry.snapshot();
        log::info!(
            "[LikedCache] cached {} music videos (complete: {})",
            snapshot.items.len(),
            snapshot.is_complete
        );
        *self.entry.lock() = Some(entry);
        drop(gate);

        if !snapshot.is_complete {
            self.start_background_fill();
        }
        Ok(snapshot)
    }

    fn warm(self: &Arc<Self>) -> Option<LikedSnapshot> {
        let snapshot = self.cached()?;
        if !snapshot.is_complete {
            self.start_background_fill();
        }
        Some(snapshot)
    }

    /// No-op while a fill is outstanding.
    pub fn start_background_fill(self: &Arc<Self>) {
        if self
            .fill_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("[LikedCache] background fill already running");
            return;
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.fill().await;
            this.fill_running.store(false, Ordering::SeqCst);
        });
        *self.fill_handle.lock() = Some(handle);
    }

    async fn fill(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let _gate = self.load_gate.lock().await;

        for page_number in 1..=self.max_pages {
            let token = {
                let entry = self.entry.lock();
                match entry.as_ref() {
                    Some(e) if !e.is_complete => e.next_page_token.clone(),
                    _ => None,
                }
            };
            let Some(token) = token else {
                break;
            };

            tokio::time::sleep(self.page_delay).await;
            if generation != self.generation.load(Ordering::SeqCst) {
                return;
            }

            let page = match self.api.liked_videos(Some(&token), LIKED_PAGE_SIZE).await {
                Ok(page) => page,
                Err(e) => {
                    log::warn!("[LikedCache] background fill stopped: {}", e);
                    return;
                }
            };

            if generation != self.generation.load(Ordering::SeqCst) {
                return;
            }

            let mut entry = self.entry.lock();
            let Some(entry) = entry.as_mut() else {
                return;
            };
            let added = entry.extend(page.items, page.next_page_token);
            log::debug!(
                "[LikedCache] page {} added {} videos (total {})",
                page_number,
                added,
                entry.data.len()
            );
            if entry.is_complete {
                log::info!("[LikedCache] all liked videos cached");
                return;
            }
        }
    }

    /// Drops cached data and discards results of in-flight loads.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.entry.lock() = None;
        if let Some(handle) = self.fill_handle.lock().take() {
            handle.abort();
        }
        self.fill_running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{music_video, FakeYoutube};

    fn page(ids: &[String], next: Option<&str>) -> crate::youtube::models::ListResponse<YoutubeVideo> {
        crate::youtube::models::ListResponse {
            items: ids.iter().map(|id| music_video(id)).collect(),
            next_page_token: next.map(String::from),
            page_info: None,
        }
    }

    fn ids(range: std::ops::Range<u32>) -> Vec<String> {
        range.map(|i| format!("v{}", i)).collect()
    }

    async fn wait_for_fill(cache: &LikedContentCache) {
        while cache.is_filling() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_page_is_complete_without_fill() {
        let api = Arc::new(FakeYoutube::default());
        api.set_liked_page(None, page(&ids(0..5), None));
        let cache = LikedContentCache::new(api.clone());

        let snapshot = cache.get_liked_videos_for_search().await.unwrap();
        assert_eq!(snapshot.items.len(), 5);
        assert!(snapshot.is_complete);
        assert!(!cache.is_filling());

        cache.get_liked_videos_for_search().await.unwrap();
        assert_eq!(api.liked_calls(), vec![None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_page_starts_exactly_one_fill() {
        let api = Arc::new(FakeYoutube::default());
        api.set_liked_page(None, page(&ids(0..50), Some("p2")));
        api.set_liked_page(Some("p2"), page(&ids(50..100), Some("p3")));
        api.set_liked_page(Some("p3"), page(&ids(100..110), None));
        let cache = LikedContentCache::new(api.clone());

        let first = cache.get_liked_videos_for_search().await.unwrap();
        assert_eq!(first.items.len(), 50);
        assert!(!first.is_complete);
        assert!(cache.is_filling());

        let again = cache.get_liked_videos_for_search().await.unwrap();
        assert!(!again.is_complete);

        wait_for_fill(&cache).await;

        assert_eq!(
            api.liked_calls(),
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
        let done = cache.get_liked_videos_for_search().await.unwrap();
        assert!(done.is_complete);
        assert_eq!(done.items.len(), 110);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_unions_pages_without_duplicates() {
        let api = Arc::new(FakeYoutube::default());
        api.set_liked_page(None, page(&ids(0..50), Some("next")));
        let mut second = ids(50..52);
        second.push("v10".to_string());
        api.set_liked_page(Some("next"), page(&second, None));
        let cache = LikedContentCache::new(api.clone());

        let first = cache.get_liked_videos_for_search().await.unwrap();
        assert!(!first.is_complete);

        wait_for_fill(&cache).await;
        let snapshot = cache.cached().unwrap();
        assert!(snapshot.is_complete);
        assert_eq!(snapshot.items.len(), 52);

        let unique: HashSet<_> = snapshot.items.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(unique.len(), 52);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_waits_between_pages() {
        let api = Arc::new(FakeYoutube::default());
        api.set_liked_page(None, page(&ids(0..2), Some("p2")));
        api.set_liked_page(Some("p2"), page(&ids(2..4), None));
        let cache = LikedContentCache::new(api.clone());

        cache.get_liked_videos_for_search().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(api.liked_calls().len(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(api.liked_calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_music_items_are_filtered() {
        let api = Arc::new(FakeYoutube::default());
        let mut listing = page(&ids(0..2), None);
        listing.items[1].snippet.title = "My gameplay vlog".to_string();
        api.set_liked_page(None, listing);
        let cache = LikedContentCache::new(api);

        let snapshot = cache.get_liked_videos_for_search().await.unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].id, "v0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let api = Arc::new(FakeYoutube::default());
        api.set_liked_page(None, page(&ids(0..3), None));
        let cache = LikedContentCache::new(api.clone());

        cache.get_liked_videos_for_search().await.unwrap();
        tokio::time::advance(Duration::from_secs(LIKED_CACHE_TTL_SECONDS + 1)).await;
        assert!(cache.cached().is_none());

        cache.get_liked_videos_for_search().await.unwrap();
        assert_eq!(api.liked_calls(), vec![None, None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_failure_leaves_cache_incomplete() {
        let api = Arc::new(FakeYoutube::default());
        api.set_liked_page(None, page(&ids(0..3), Some("missing")));
        let cache = LikedContentCache::new(api.clone());

        cache.get_liked_videos_for_search().await.unwrap();
        wait_for_fill(&cache).await;

        let snapshot = cache.cached().unwrap();
        assert!(!snapshot.is_complete);
        assert_eq!(snapshot.items.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_clears_entry() {
        let api = Arc::new(FakeYoutube::default());
        api.set_liked_page(None, page(&ids(0..3), Some("p2")));
        api.set_liked_page(Some("p2"), page(&ids(3..6), None));
        let cache = LikedContentCache::new(api.clone());

        cache.get_liked_videos_for_search().await.unwrap();
        cache.invalidate();

        assert!(cache.cached().is_none());
        assert!(!cache.is_filling());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(api.liked_calls(), vec![None]);
    }
}
