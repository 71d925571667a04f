//! Progress poller
//!
//! Low-frequency background reader of the playback position, for progress
//! bars and resume bookkeeping. It only ever reads through a
//! [`PositionProbe`], so a pipeline clear can never race it into a released
//! graph. Shutdown is cooperative: [`ProgressPoller::stop`] raises the cancel
//! flag, wakes the thread and joins it.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::transport::PositionProbe;

// ============================================================================
// Cancellation
// ============================================================================

#[derive(Default)]
struct CancelShared {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

/// Cloneable cooperative cancellation flag
#[derive(Clone, Default)]
pub struct CancelToken {
    shared: Arc<CancelShared>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self.shared.cancelled.lock();
        *cancelled = true;
        self.shared.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shared.cancelled.lock()
    }

    /// Sleep up to `timeout`. Returns true if cancelled before or during
    /// the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut cancelled = self.shared.cancelled.lock();
        if !*cancelled {
            self.shared.cond.wait_for(&mut cancelled, timeout);
        }
        *cancelled
    }
}

// ============================================================================
// Poller
// ============================================================================

pub struct ProgressPoller {
    token: CancelToken,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProgressPoller {
    /// Start polling. `callback` receives `(position, duration)` once per
    /// interval until the poller is stopped.
    pub fn spawn<F>(probe: PositionProbe, interval: Duration, mut callback: F) -> Self
    where
        F: FnMut(f64, f64) + Send + 'static,
    {
        let token = CancelToken::new();
        let thread_token = token.clone();

        let handle = thread::Builder::new()
            .name("reelgraph-poller".to_string())
            .spawn(move || {
                tracing::debug!("Progress poller started ({:?})", interval);
                while !thread_token.wait_timeout(interval) {
                    callback(probe.position(), probe.duration());
                }
                tracing::debug!("Progress poller stopped");
            });

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!("Failed to spawn progress poller: {}", e);
                None
            }
        };

        Self { token, handle }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal and join. Safe to call more than once.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Progress poller panicked");
            }
        }
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_token_wait_returns_early_when_cancelled() {
        let token = CancelToken::new();
        let other = token.clone();
        let waiter = thread::spawn(move || {
            let start = Instant::now();
            let cancelled = other.wait_timeout(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        let (cancelled, elapsed) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_token_wait_times_out() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(5)));
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.wait_timeout(Duration::from_secs(10)));
    }

    #[test]
    fn test_poller_reads_empty_probe_as_zero_and_stops() {
        let probe = PositionProbe::default();
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = samples.clone();

        let mut poller = ProgressPoller::spawn(probe, Duration::from_millis(5), move |p, d| {
            sink.lock().push((p, d));
        });
        thread::sleep(Duration::from_millis(60));
        poller.stop();
        assert!(!poller.is_running());

        let taken = samples.lock().len();
        assert!(taken > 0);
        assert!(samples.lock().iter().all(|&(p, d)| p == 0.0 && d == 0.0));

        // No more callbacks after stop
        thread::sleep(Duration::from_millis(20));
        assert_eq!(samples.lock().len(), taken);
        poller.stop();
    }
}
