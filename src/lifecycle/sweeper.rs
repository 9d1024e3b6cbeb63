//! Periodic eviction of expired security state.
//!
//! # Responsibilities
//! - Drop rate-limit windows whose reset time has passed
//! - Unblock clients whose block has expired and forget stale violation records
//! - Publish the resulting table sizes as gauges

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::security::{IpGuard, RateLimiter};

pub struct Sweeper {
    rate_limiter: Arc<RateLimiter>,
    ip_guard: Arc<IpGuard>,
    rate_interval: Duration,
    guard_interval: Duration,
}

impl Sweeper {
    pub fn new(rate_limiter: Arc<RateLimiter>, ip_guard: Arc<IpGuard>, config: &GatewayConfig) -> Self {
        Self {
            rate_limiter,
            ip_guard,
            rate_interval: Duration::from_secs(config.rate_limit.sweep_interval_secs.max(1)),
            guard_interval: Duration::from_secs(config.ip_guard.sweep_interval_secs.max(1)),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            rate_interval_secs = self.rate_interval.as_secs(),
            guard_interval_secs = self.guard_interval.as_secs(),
            "State sweeper starting"
        );

        let mut rate_ticker = time::interval(self.rate_interval);
        let mut guard_ticker = time::interval(self.guard_interval);
        rate_ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        guard_ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = rate_ticker.tick() => self.sweep_rate_windows(),
                _ = guard_ticker.tick() => self.sweep_blocks(),
                _ = shutdown.recv() => {
                    tracing::info!("State sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn sweep_rate_windows(&self) {
        let removed = self.rate_limiter.sweep();
        if removed > 0 {
            tracing::debug!(removed, "Expired rate-limit windows evicted");
        }
        metrics::record_rate_windows(self.rate_limiter.window_count());
    }

    fn sweep_blocks(&self) {
        let removed = self.ip_guard.sweep_expired();
        if removed > 0 {
            tracing::info!(removed, "Expired client blocks cleared");
        }
        metrics::record_blocked_clients(self.ip_guard.blocked_count());
    }
}
