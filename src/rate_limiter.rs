//! Serializing request limiter for quota-constrained provider APIs.
//!
//! Requests are dispatched one at a time in arrival order, spaced by a minimum
//! interval. A rate-limit failure opens a fixed backoff window that every
//! later request waits out before dispatch.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::{AppError, Result};

#[derive(Debug, Default)]
struct Timing {
    last_finished: Option<Instant>,
    backoff_until: Option<Instant>,
}

pub struct RateLimiter {
    name: &'static str,
    min_interval: Duration,
    backoff: Duration,
    /// tokio's mutex hands out the lock in FIFO order.
    gate: tokio::sync::Mutex<()>,
    timing: Mutex<Timing>,
    generation: AtomicU64,
    pending: AtomicUsize,
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateLimiter {
    pub fn new(name: &'static str, min_interval: Duration, backoff: Duration) -> Self {
        Self {
            name,
            min_interval,
            backoff,
            gate: tokio::sync::Mutex::new(()),
            timing: Mutex::new(Timing::default()),
            generation: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    /// Requests queued or running right now.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_backing_off(&self) -> bool {
        self.timing
            .lock()
            .backoff_until
            .is_some_and(|until| until > Instant::now())
    }

    pub async fn enqueue<T, F, Fut>(&self, request: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        self.pending.fetch_add(1, Ordering::SeqCst);
        let _pending = PendingGuard(&self.pending);

        let _turn = self.gate.lock().await;
        self.ensure_current(generation)?;

        if let Some(ready_at) = self.next_dispatch_at() {
            if ready_at > Instant::now() {
                log::debug!(
                    "[{}] waiting {:?} before dispatch",
                    self.name,
                    ready_at - Instant::now()
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        self.ensure_current(generation)?;

        let result = request().await;

        // Finished after a clear: the reset timing belongs to the next session.
        if self.generation.load(Ordering::SeqCst) != generation {
            return result;
        }

        let mut timing = self.timing.lock();
        let now = Instant::now();
        timing.last_finished = Some(now);
        if let Err(ref e) = result {
            if e.is_rate_limit() {
                log::warn!(
                    "[{}] rate limited, backing off for {:?}",
                    self.name,
                    self.backoff
                );
                timing.backoff_until = Some(now + self.backoff);
            }
        }

        result
    }

    /// Reject everything still queued and forget pacing state.
    /// A request already dispatched runs to completion for its own caller.
    pub fn clear(&self) {
        let dropped = self.pending();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.timing.lock() = Timing::default();
        log::info!("[{}] cleared ({} pending requests dropped)", self.name, dropped);
    }

    fn next_dispatch_at(&self) -> Option<Instant> {
        let timing = self.timing.lock();
        let spaced = timing.last_finished.map(|t| t + self.min_interval);
        match (spaced, timing.backoff_until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(AppError::Cancelled(format!(
                "{} queue was cleared",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::Arc;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            "test",
            Duration::from_millis(100),
            Duration::from_millis(5000),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_in_fifo_order_with_spacing() {
        let limiter = limiter();
        let log = Arc::new(Mutex::new(Vec::new()));

        let calls = (0..4).map(|i| {
            let log = log.clone();
            let limiter = &limiter;
            async move {
                limiter
                    .enqueue(|| async move {
                        log.lock().push((i, Instant::now()));
                        Ok(i)
                    })
                    .await
            }
        });
        let results = join_all(calls).await;
        assert_eq!(
            results.into_iter().map(|r| r.unwrap()).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );

        let log = log.lock();
        let order: Vec<_> = log.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        for pair in log.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_opens_backoff_window() {
        let limiter = limiter();
        let start = Instant::now();

        let first: Result<()> = limiter
            .enqueue(|| async { Err(AppError::RateLimited("429".into())) })
            .await;
        assert!(first.unwrap_err().is_rate_limit());
        assert!(limiter.is_backing_off());

        let dispatched_at = limiter.enqueue(|| async { Ok(Instant::now()) }).await.unwrap();
        assert!(dispatched_at - start >= Duration::from_millis(5000));
        assert!(!limiter.is_backing_off());
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_failure_only_rejects_its_caller() {
        let limiter = limiter();
        let start = Instant::now();

        let failed: Result<()> = limiter
            .enqueue(|| async { Err(AppError::Network("boom".into())) })
            .await;
        assert!(failed.is_err());
        assert!(!limiter.is_backing_off());

        let dispatched_at = limiter.enqueue(|| async { Ok(Instant::now()) }).await.unwrap();
        assert!(dispatched_at - start < Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_rejects_queued_requests() {
        let limiter = Arc::new(limiter());

        let running = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter
                    .enqueue(|| async {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        let queued = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.enqueue(|| async { Ok(2) }).await })
        };

        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(limiter.pending(), 2);

        limiter.clear();

        assert_eq!(running.await.unwrap(), Ok(1));
        assert!(matches!(queued.await.unwrap(), Err(AppError::Cancelled(_))));
        assert_eq!(limiter.pending(), 0);

        // Fresh requests after a clear go through.
        assert_eq!(limiter.enqueue(|| async { Ok(3) }).await, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_finishing_after_clear_is_ignored() {
        let limiter = Arc::new(limiter());

        let stale = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter
                    .enqueue(|| async {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        Err::<(), _>(AppError::RateLimited("429".into()))
                    })
                    .await
            })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        limiter.clear();
        assert!(stale.await.unwrap().unwrap_err().is_rate_limit());
        assert!(!limiter.is_backing_off());

        let start = Instant::now();
        let dispatched_at = limiter.enqueue(|| async { Ok(Instant::now()) }).await.unwrap();
        assert_eq!(dispatched_at, start);
    }
}
