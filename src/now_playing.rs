//! Forwards the current track to the lyrics backend.
//!
//! Updates go through a depth-1 coalescing slot: while one update is in
//! flight, newer updates replace each other and only the latest is sent
//! next. Updates never overlap and the last submitted track always wins.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::errors::Result;
use crate::lyrics::{LyricsBackend, NowPlayingRecord, NowPlayingUpdate};

#[derive(Debug, Default)]
struct Slot {
    pending: Option<NowPlayingUpdate>,
    in_flight: bool,
}

pub struct NowPlayingBridge {
    backend: Arc<dyn LyricsBackend>,
    slot: Mutex<Slot>,
    last_sent: Mutex<Option<NowPlayingUpdate>>,
    remote: RwLock<Option<NowPlayingRecord>>,
}

impl NowPlayingBridge {
    pub fn new(backend: Arc<dyn LyricsBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            slot: Mutex::new(Slot::default()),
            last_sent: Mutex::new(None),
            remote: RwLock::new(None),
        })
    }

    pub fn backend(&self) -> &Arc<dyn LyricsBackend> {
        &self.backend
    }

    /// Queue an update, replacing any update that has not started yet.
    pub fn submit(self: &Arc<Self>, update: NowPlayingUpdate) {
        let mut slot = self.slot.lock();
        slot.pending = Some(update);
        if slot.in_flight {
            log::debug!("[NowPlaying] update in flight, coalescing");
            return;
        }
        slot.in_flight = true;
        drop(slot);

        let this = Arc::clone(self);
        tokio::spawn(async move { this.drain().await });
    }

    async fn drain(&self) {
        loop {
            let next = {
                let mut slot = self.slot.lock();
                match slot.pending.take() {
                    Some(update) => update,
                    None => {
                        slot.in_flight = false;
                        return;
                    }
                }
            };

            match self.backend.update_now_playing(&next).await {
                Ok(()) => {
                    log::info!("[NowPlaying] backend updated: {} - {}", next.artist, next.name);
                    *self.last_sent.lock() = Some(next);
                }
                Err(e) => log::warn!("[NowPlaying] backend update failed: {}", e),
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        let slot = self.slot.lock();
        !slot.in_flight && slot.pending.is_none()
    }

    pub fn last_sent(&self) -> Option<NowPlayingUpdate> {
        self.last_sent.lock().clone()
    }

    /// Re-read the backend's record and keep it for [`Self::remote`].
    pub async fn refresh_remote(&self) -> Result<Option<NowPlayingRecord>> {
        let record = self.backend.get_now_playing().await?;
        *self.remote.write() = record.clone();
        Ok(record)
    }

    pub fn remote(&self) -> Option<NowPlayingRecord> {
        self.remote.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use std::time::Duration;

    fn update(id: &str) -> NowPlayingUpdate {
        NowPlayingUpdate {
            id: id.to_string(),
            name: format!("Song {}", id),
            artist: "Artist".to_string(),
            album: None,
        }
    }

    async fn wait_idle(bridge: &NowPlayingBridge) {
        while !bridge.is_idle() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_update_wins() {
        let backend = Arc::new(FakeBackend::gated());
        let bridge = NowPlayingBridge::new(backend.clone());

        bridge.submit(update("a"));
        tokio::task::yield_now().await;
        bridge.submit(update("b"));
        bridge.submit(update("c"));

        backend.release(10);
        wait_idle(&bridge).await;

        let sent: Vec<_> = backend.updates().into_iter().map(|u| u.id).collect();
        assert_eq!(sent, vec!["a", "c"]);
        assert_eq!(bridge.last_sent().map(|u| u.id).as_deref(), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_update_does_not_stall_queue() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_updates(true);
        let bridge = NowPlayingBridge::new(backend.clone());

        bridge.submit(update("a"));
        wait_idle(&bridge).await;
        assert!(bridge.last_sent().is_none());

        backend.fail_updates(false);
        bridge.submit(update("b"));
        wait_idle(&bridge).await;
        assert_eq!(bridge.last_sent().map(|u| u.id).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_refresh_remote_keeps_record() {
        let backend = Arc::new(FakeBackend::default());
        let bridge = NowPlayingBridge::new(backend.clone());

        assert!(bridge.refresh_remote().await.unwrap().is_none());

        backend.set_remote(Some(NowPlayingRecord {
            name: Some("Song".to_string()),
            ..Default::default()
        }));
        bridge.refresh_remote().await.unwrap();
        assert_eq!(bridge.remote().and_then(|r| r.name).as_deref(), Some("Song"));
    }
}
