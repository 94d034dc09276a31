//! Per-client fixed-window rate limiting.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Counter state for one client's current window.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Fixed-window request counter, one window per client.
///
/// Coarse on purpose: a burst straddling a window boundary can reach about
/// twice the nominal rate. State is in-memory and lost on restart.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request for `client_id`; `true` if it fits in `limit`.
    pub fn check(&self, client_id: &str, limit: u32) -> bool {
        self.check_at(client_id, limit, Instant::now())
    }

    pub fn check_at(&self, client_id: &str, limit: u32, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        let bucket = buckets
            .entry(client_id.to_string())
            .or_insert(Bucket {
                window_start: now,
                count: 0,
            });
        if now.saturating_duration_since(bucket.window_start) >= self.window {
            *bucket = Bucket {
                window_start: now,
                count: 0,
            };
        }

        bucket.count = bucket.count.saturating_add(1);
        bucket.count <= limit
    }

    /// Drop buckets whose window has already elapsed.
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, b| now.saturating_duration_since(b.window_start) < window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
