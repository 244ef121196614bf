use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs `tick` every `interval` until stopped or dropped.
pub struct Poller {
    name: &'static str,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            log::debug!("[{}] poll loop started", name);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                tick().await;
            }
            log::debug!("[{}] poll loop stopped", name);
        });

        Self {
            name,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            log::debug!("[{}] stopping poll loop", self.name);
            handle.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(interval: Duration) -> (Poller, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let poller = Poller::spawn("test", interval, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (poller, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let (mut poller, count) = counting(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(11)).await;
        // Immediate first tick, then at 5s and 10s.
        assert_eq!(count.load(Ordering::SeqCst), 3);

        poller.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let (poller, count) = counting(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(poller);

        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
