//! In-memory rate limiting for inbound socket frames.
//!
//! DESIGN
//! ======
//! One token bucket per connection id, backed by `HashMap<String, Bucket>`.
//! A bucket starts full at `burst` tokens and refills continuously at
//! `per_sec` tokens per second. Each admitted frame spends one token; a
//! rejected frame reports how long until the next token is available.
//!
//! Buckets are never removed on the hot path. The sweep scheduler calls
//! `sweep` periodically to drop buckets that have sat idle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::HubConfig;
use crate::frame::ErrorCode;

#[derive(Debug, Clone, Copy)]
struct RateLimitConfig {
    burst: f64,
    per_sec: f64,
}

impl RateLimitConfig {
    fn from_hub(config: &HubConfig) -> Self {
        Self {
            burst: f64::from(config.rate_limit_burst.max(1)),
            per_sec: f64::from(config.rate_limit_per_sec.max(1)),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded, retry in {retry_after_ms}ms")]
    Limited { retry_after_ms: u64 },
}

impl ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }

    fn retryable(&self) -> bool {
        true
    }
}

impl RateLimitError {
    #[must_use]
    pub fn retry_after_ms(&self) -> u64 {
        match self {
            Self::Limited { retry_after_ms } => *retry_after_ms,
        }
    }
}

/// Outcome of a single `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after_ms: u64,
}

impl RateDecision {
    /// Convert to a `Result` for `?`-style call sites.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::Limited` when the decision is a rejection.
    pub fn into_result(self) -> Result<(), RateLimitError> {
        if self.allowed {
            Ok(())
        } else {
            Err(RateLimitError::Limited { retry_after_ms: self.retry_after_ms })
        }
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, Bucket>>>,
    config: RateLimitConfig,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &HubConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), config: RateLimitConfig::from_hub(config) }
    }

    /// Spend one token for `client_id`.
    pub fn check(&self, client_id: &str) -> RateDecision {
        self.check_at(client_id, Instant::now())
    }

    /// Internal: check with explicit timestamp (for testing).
    fn check_at(&self, client_id: &str, now: Instant) -> RateDecision {
        let mut buckets = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let cfg = self.config;

        let bucket = buckets
            .entry(client_id.to_owned())
            .or_insert(Bucket { tokens: cfg.burst, refilled_at: now });
        refill(bucket, now, cfg);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return RateDecision { allowed: true, retry_after_ms: 0 };
        }

        let missing = 1.0 - bucket.tokens;
        let wait = Duration::from_secs_f64(missing / cfg.per_sec);
        let retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX).max(1);
        RateDecision { allowed: false, retry_after_ms }
    }

    /// Drop buckets untouched for longer than `idle`. Returns how many were dropped.
    pub fn sweep(&self, now: Instant, idle: Duration) -> usize {
        let mut buckets = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.refilled_at) <= idle);
        before - buckets.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn refill(bucket: &mut Bucket, now: Instant, cfg: RateLimitConfig) {
    let elapsed = now.saturating_duration_since(bucket.refilled_at).as_secs_f64();
    bucket.tokens = (bucket.tokens + elapsed * cfg.per_sec).min(cfg.burst);
    bucket.refilled_at = now;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
