//! IP reputation guard: static access lists plus violation-driven blocks.
//!
//! # Evaluation order
//! 1. Whitelist: when non-empty, only listed identifiers pass
//! 2. Blacklist: listed identifiers are rejected
//! 3. Dynamic blocks: rejected while `now < blocked_until`, cleared lazily after
//!
//! Reaching `max_violations_before_block` turns the accumulated violations into
//! a timed block and resets the counter. The access lists are hot-swappable.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::config::IpGuardConfig;

/// Static whitelist/blacklist snapshot.
#[derive(Debug, Default)]
struct AccessLists {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
}

impl AccessLists {
    fn from_config(config: &IpGuardConfig) -> Self {
        Self {
            whitelist: config.whitelist.iter().cloned().collect(),
            blacklist: config.blacklist.iter().cloned().collect(),
        }
    }
}

/// Violation bookkeeping for one identifier.
#[derive(Debug, Clone)]
pub struct ViolationRecord {
    pub violation_count: u32,
    pub blocked_until: Option<Instant>,
    pub last_violation_at: Instant,
    pub last_reason: String,
}

/// Why a client was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    NotWhitelisted,
    Blacklisted,
    Blocked { remaining: Duration },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::NotWhitelisted => write!(f, "client is not whitelisted"),
            DenyReason::Blacklisted => write!(f, "client is blacklisted"),
            DenyReason::Blocked { remaining } => {
                write!(f, "client is temporarily blocked for {}s", remaining.as_secs())
            }
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allowed,
    Denied(DenyReason),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allowed)
    }
}

/// Result of recording a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    /// Violation counted; carries the running count.
    Counted(u32),
    /// The threshold was reached and the client is now blocked.
    Blocked { until: Instant },
}

#[derive(Debug)]
pub struct IpGuard {
    lists: ArcSwap<AccessLists>,
    records: DashMap<String, ViolationRecord>,
    max_violations: u32,
    block_duration: Duration,
}

impl IpGuard {
    pub fn new(config: &IpGuardConfig) -> Self {
        Self {
            lists: ArcSwap::from_pointee(AccessLists::from_config(config)),
            records: DashMap::new(),
            max_violations: config.max_violations_before_block.max(1),
            block_duration: Duration::from_secs(config.block_duration_secs),
        }
    }

    /// Replace the static access lists atomically.
    pub fn update_lists(&self, config: &IpGuardConfig) {
        self.lists.store(Arc::new(AccessLists::from_config(config)));
        tracing::info!(
            whitelist = config.whitelist.len(),
            blacklist = config.blacklist.len(),
            "IP access lists updated"
        );
    }

    pub fn is_allowed(&self, identifier: &str) -> GuardDecision {
        self.is_allowed_at(identifier, Instant::now())
    }

    pub fn is_allowed_at(&self, identifier: &str, now: Instant) -> GuardDecision {
        {
            let lists = self.lists.load();
            if !lists.whitelist.is_empty() && !lists.whitelist.contains(identifier) {
                return GuardDecision::Denied(DenyReason::NotWhitelisted);
            }
            if lists.blacklist.contains(identifier) {
                return GuardDecision::Denied(DenyReason::Blacklisted);
            }
        }

        let expired = match self.records.get_mut(identifier) {
            Some(mut record) => match record.blocked_until {
                Some(until) if now < until => {
                    return GuardDecision::Denied(DenyReason::Blocked {
                        remaining: until - now,
                    });
                }
                Some(_) => {
                    record.blocked_until = None;
                    record.violation_count == 0
                }
                None => false,
            },
            None => false,
        };

        if expired {
            self.records
                .remove_if(identifier, |_, r| r.blocked_until.is_none() && r.violation_count == 0);
            tracing::info!(client = %identifier, "Dynamic block expired");
        }

        GuardDecision::Allowed
    }

    pub fn record_violation(&self, identifier: &str, reason: &str) -> ViolationOutcome {
        self.record_violation_at(identifier, reason, Instant::now())
    }

    pub fn record_violation_at(&self, identifier: &str, reason: &str, now: Instant) -> ViolationOutcome {
        let mut record = self
            .records
            .entry(identifier.to_string())
            .or_insert_with(|| ViolationRecord {
                violation_count: 0,
                blocked_until: None,
                last_violation_at: now,
                last_reason: String::new(),
            });

        record.violation_count += 1;
        record.last_violation_at = now;
        record.last_reason = reason.to_string();

        if record.violation_count >= self.max_violations {
            let until = now + self.block_duration;
            record.blocked_until = Some(until);
            record.violation_count = 0;
            tracing::warn!(
                client = %identifier,
                reason = %reason,
                block_secs = self.block_duration.as_secs(),
                "Client blocked after repeated violations"
            );
            ViolationOutcome::Blocked { until }
        } else {
            tracing::debug!(client = %identifier, reason = %reason, count = record.violation_count, "Violation recorded");
            ViolationOutcome::Counted(record.violation_count)
        }
    }

    /// Block a client immediately, regardless of its violation count.
    pub fn block(&self, identifier: &str, reason: &str) -> Instant {
        self.block_at(identifier, reason, Instant::now())
    }

    pub fn block_at(&self, identifier: &str, reason: &str, now: Instant) -> Instant {
        let until = now + self.block_duration;
        let mut record = self
            .records
            .entry(identifier.to_string())
            .or_insert_with(|| ViolationRecord {
                violation_count: 0,
                blocked_until: None,
                last_violation_at: now,
                last_reason: String::new(),
            });
        record.blocked_until = Some(until);
        record.violation_count = 0;
        record.last_reason = reason.to_string();
        tracing::warn!(client = %identifier, reason = %reason, "Client blocked");
        until
    }

    /// Snapshot of an identifier's record.
    pub fn record(&self, identifier: &str) -> Option<ViolationRecord> {
        self.records.get(identifier).map(|r| r.value().clone())
    }

    /// Drop expired blocks and stale violation counts. Returns how many records were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let before = self.records.len();
        let stale_after = self.block_duration;
        self.records.retain(|_, record| {
            if let Some(until) = record.blocked_until {
                if now < until {
                    return true;
                }
                record.blocked_until = None;
            }
            record.violation_count > 0
                && now.saturating_duration_since(record.last_violation_at) < stale_after
        });
        before.saturating_sub(self.records.len())
    }

    /// Number of clients currently under a dynamic block.
    pub fn blocked_count(&self) -> usize {
        let now = Instant::now();
        self.records
            .iter()
            .filter(|r| r.blocked_until.is_some_and(|until| now < until))
            .count()
    }
}
