//! Bounded security-event journal.
//!
//! # Responsibilities
//! - Append events to a ring buffer, evicting the oldest beyond capacity
//! - Mirror each event to `tracing` at a level derived from its severity
//! - Answer filtered queries newest-first and per-client anomaly checks
//!
//! # Design Decisions
//! - Best effort: a poisoned lock is recovered, recording never fails
//! - The enable flag is hot-reloadable; disabled means `record` is a no-op

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::audit::event::{AuditEvent, AuditEventType, AuditQuery, Severity};
use crate::config::AuditConfig;
use crate::observability::metrics;

const RATE_LIMIT_THRESHOLD: usize = 5;
const CSRF_THRESHOLD: usize = 3;
const AUTH_FAILURE_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total_events: usize,
    pub capacity: usize,
    pub by_type: HashMap<AuditEventType, usize>,
}

#[derive(Debug)]
pub struct AuditLog {
    events: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
    enabled: AtomicBool,
}

impl AuditLog {
    pub fn new(config: &AuditConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            enabled: AtomicBool::new(config.enabled),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::Relaxed) != enabled {
            tracing::info!(enabled, "Audit log toggled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn record(&self, event: AuditEvent) {
        if !self.is_enabled() {
            return;
        }

        let event_type = event.event_type.as_str();
        match event.severity {
            Severity::Low => tracing::debug!(
                event_type, client = %event.client, path = %event.path, details = %event.details, "Audit event"
            ),
            Severity::Medium => tracing::info!(
                event_type, client = %event.client, path = %event.path, details = %event.details, "Audit event"
            ),
            Severity::High => tracing::warn!(
                event_type, client = %event.client, path = %event.path, details = %event.details, "Audit event"
            ),
            Severity::Critical => tracing::error!(
                event_type, client = %event.client, path = %event.path, details = %event.details, "Audit event"
            ),
        }
        metrics::record_audit_event(event_type);

        let mut events = self.lock();
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Matching events, newest timestamp first. Equal timestamps keep the latest insertion first.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEvent> {
        let limit = query.limit.unwrap_or(AuditQuery::DEFAULT_LIMIT);
        let mut matched: Vec<AuditEvent> = self
            .lock()
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(limit);
        matched
    }

    /// Whether `client` crossed any anomaly threshold within the trailing window.
    pub fn is_anomalous(&self, client: &str, window_minutes: i64) -> bool {
        self.is_anomalous_at(client, window_minutes, Utc::now())
    }

    pub fn is_anomalous_at(&self, client: &str, window_minutes: i64, now: DateTime<Utc>) -> bool {
        let since = now - ChronoDuration::minutes(window_minutes);
        let (mut rate_limited, mut csrf, mut auth) = (0usize, 0usize, 0usize);

        for event in self.lock().iter() {
            if event.timestamp < since || event.client != client {
                continue;
            }
            match event.event_type {
                AuditEventType::RateLimitExceeded => rate_limited += 1,
                AuditEventType::CsrfFailure => csrf += 1,
                AuditEventType::AuthFailure => auth += 1,
                _ => {}
            }
        }

        rate_limited > RATE_LIMIT_THRESHOLD || csrf > CSRF_THRESHOLD || auth > AUTH_FAILURE_THRESHOLD
    }

    pub fn stats(&self) -> AuditStats {
        let events = self.lock();
        let mut by_type = HashMap::new();
        for event in events.iter() {
            *by_type.entry(event.event_type).or_insert(0) += 1;
        }
        AuditStats {
            total_events: events.len(),
            capacity: self.capacity,
            by_type,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
