//! Fixed-window rate limiting keyed by client identifier.
//!
//! A window opens on the first request from an identifier (or on the first
//! request after the previous window's reset instant has passed) with a count
//! of 1. Subsequent requests in the window increment the count and are
//! rejected once it exceeds the configured maximum. The check-and-increment
//! runs under the map shard lock for that identifier, so concurrent requests
//! never lose updates.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::config::RateLimitConfig;

/// Per-identifier window state.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

impl RateDecision {
    /// Wall-clock reset instant as unix seconds, rounded up.
    pub fn reset_at_unix(&self) -> u64 {
        let at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            + self.reset_after;
        at.as_secs() + u64::from(at.subsec_nanos() > 0)
    }

    /// Whole seconds a client should wait before retrying.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 { secs + 1 } else { secs }
    }
}

/// Fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    window: Duration,
    max_requests: u32,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            enabled: config.enabled,
        }
    }

    /// Count a request from `identifier` against its current window.
    pub fn check(&self, identifier: &str) -> RateDecision {
        self.check_at(identifier, Instant::now())
    }

    pub fn check_at(&self, identifier: &str, now: Instant) -> RateDecision {
        if !self.enabled {
            return RateDecision {
                allowed: true,
                limit: self.max_requests,
                remaining: self.max_requests,
                reset_after: Duration::ZERO,
            };
        }

        let fresh = RateWindow {
            count: 1,
            reset_at: now + self.window,
        };

        let window = match self.windows.entry(identifier.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get_mut();
                if now > current.reset_at {
                    *current = fresh;
                } else {
                    current.count = current.count.saturating_add(1);
                }
                *current
            }
            Entry::Vacant(vacant) => *vacant.insert(fresh),
        };

        RateDecision {
            allowed: window.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(window.count),
            reset_after: window.reset_at.saturating_duration_since(now),
        }
    }

    /// Remove windows whose reset instant has passed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| now <= window.reset_at);
        before.saturating_sub(self.windows.len())
    }

    /// Number of live windows.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}
