//! Token-bucket throttling for upstream services.
//!
//! One bucket per upstream (`NOMINATIM`, `SHOWTIMES`, ...). Callers `acquire`
//! before each request; the call suspends until a token is available, which
//! makes the throttle delay an ordinary suspension point.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::models::SourceId;

/// Throttle applied to an upstream without explicit configuration.
const FALLBACK_PER_MINUTE: f64 = 60.0;
const FALLBACK_BURST: f64 = 5.0;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refreshed_at: Instant,
    per_second: f64,
    burst: f64,
}

impl Bucket {
    fn from_limit(limit: &UpstreamLimit) -> Self {
        let burst = limit.burst.max(1.0);
        Self {
            tokens: burst,
            refreshed_at: Instant::now(),
            per_second: f64::from(limit.requests_per_minute.max(1)) / 60.0,
            burst,
        }
    }

    fn refresh(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refreshed_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.per_second).min(self.burst);
        self.refreshed_at = now;
    }

    /// Takes a token, or returns how long until one is available.
    fn take(&mut self) -> Result<(), Duration> {
        self.refresh();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.per_second))
        }
    }
}

/// Request budget for one upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamLimit {
    pub requests_per_minute: u32,
    /// Requests allowed back to back before throttling kicks in.
    pub burst: f64,
}

impl UpstreamLimit {
    /// Nominatim's usage policy: at most one request per second, no bursts.
    pub const fn one_per_second() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 1.0,
        }
    }
}

impl Default for UpstreamLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: FALLBACK_PER_MINUTE as u32,
            burst: FALLBACK_BURST,
        }
    }
}

/// Shared rate limiter holding one token bucket per upstream.
#[derive(Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    limits: Mutex<HashMap<String, UpstreamLimit>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worst case after a poisoned lock is a slightly-off throttle.
    fn buckets(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn limits(&self) -> MutexGuard<'_, HashMap<String, UpstreamLimit>> {
        self.limits.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter limits mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Sets the budget of `upstream`, resetting its bucket.
    pub fn configure(&self, upstream: &SourceId, limit: UpstreamLimit) {
        self.limits().insert(upstream.to_string(), limit);
        self.buckets().remove(upstream.as_ref());
    }

    /// Builder form of [`configure`](Self::configure).
    pub fn with_limit(self, upstream: SourceId, limit: UpstreamLimit) -> Self {
        self.configure(&upstream, limit);
        self
    }

    /// Waits until `upstream` has a token and takes it.
    pub async fn acquire(&self, upstream: &SourceId) {
        loop {
            let wait = match self.take(upstream) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            debug!("Throttling '{}' for {:?}", upstream, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Takes a token without waiting. Returns false when throttled.
    pub fn try_acquire(&self, upstream: &SourceId) -> bool {
        self.take(upstream).is_ok()
    }

    fn take(&self, upstream: &SourceId) -> Result<(), Duration> {
        let limit = self
            .limits()
            .get(upstream.as_ref())
            .cloned()
            .unwrap_or_default();
        let mut buckets = self.buckets();
        buckets
            .entry(upstream.to_string())
            .or_insert_with(|| Bucket::from_limit(&limit))
            .take()
    }
}
