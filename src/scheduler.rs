//! Cooperative timing. Every wait in the engine goes through a [`Scheduler`]
//! so tests can run on a virtual clock.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, duration: Duration);
    fn now(&self) -> Instant;
}

/// Real time, backed by tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Virtual clock: `sleep` advances time immediately and is recorded.
#[derive(Debug)]
pub struct VirtualScheduler {
    origin: Instant,
    state: Mutex<VirtualState>,
}

#[derive(Debug, Default)]
struct VirtualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(VirtualState::default()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.elapsed += duration;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.state.lock().map(|s| s.elapsed).unwrap_or_default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .map(|s| s.sleeps.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Scheduler for VirtualScheduler {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.elapsed += duration;
            state.sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }

    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// Poll `probe` every `interval` until it yields `Some` or `timeout` elapses.
///
/// The probe always runs at least once. Returns `None` on timeout.
pub async fn poll_until<T, F, Fut>(
    scheduler: &dyn Scheduler,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = scheduler.now();
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if scheduler.now().duration_since(start) >= timeout {
            return None;
        }
        scheduler.sleep(interval).await;
    }
}

/// Retry `probe` a fixed number of times with `delay` between attempts.
pub async fn retry_attempts<T, F, Fut>(
    scheduler: &dyn Scheduler,
    attempts: usize,
    delay: Duration,
    mut probe: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            scheduler.sleep(delay).await;
        }
        if let Some(value) = probe().await {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn poll_until_times_out_without_real_waiting() {
        let scheduler = VirtualScheduler::new();
        let started = Instant::now();
        let result: Option<()> = poll_until(
            &scheduler,
            Duration::from_secs(10),
            Duration::from_millis(500),
            || async { None },
        )
        .await;
        assert!(result.is_none());
        assert_eq!(scheduler.elapsed(), Duration::from_secs(10));
        assert_eq!(scheduler.sleeps().len(), 20);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn poll_until_returns_first_hit() {
        let scheduler = VirtualScheduler::new();
        let calls = AtomicUsize::new(0);
        let result = poll_until(
            &scheduler,
            Duration::from_secs(5),
            Duration::from_millis(100),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { (n == 3).then_some(n) }
            },
        )
        .await;
        assert_eq!(result, Some(3));
        assert_eq!(scheduler.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn retry_attempts_sleeps_between_attempts_only() {
        let scheduler = VirtualScheduler::new();
        let result: Option<()> =
            retry_attempts(&scheduler, 4, Duration::from_millis(250), || async { None }).await;
        assert!(result.is_none());
        assert_eq!(scheduler.sleeps().len(), 3);
    }
}
