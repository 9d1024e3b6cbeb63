//! Shared bookkeeping for a flagged request.
//!
//! Every violation is audited and counted against the client. A client that
//! crosses the violation threshold is blocked by the IP guard; one whose audit
//! trail looks anomalous is escalated and blocked immediately when escalation
//! is enabled.

use serde_json::{json, Value};

use crate::audit::{AuditEvent, AuditEventType, Severity};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_id::ClientIdentifier;
use crate::security::ip_guard::ViolationOutcome;

#[derive(Debug, Clone)]
pub struct Violation {
    pub event_type: AuditEventType,
    pub severity: Severity,
    /// Short reason, also the rejection metric label.
    pub reason: &'static str,
    pub details: Value,
}

pub fn flag_violation(state: &AppState, client: &ClientIdentifier, path: &str, violation: Violation) {
    let Violation { event_type, severity, reason, details } = violation;
    metrics::record_rejection(reason);
    state
        .audit
        .record(AuditEvent::new(event_type, severity, client.as_str(), path, details));

    let block_secs = state.config.ip_guard.block_duration_secs;
    match state.ip_guard.record_violation(client.as_str(), reason) {
        ViolationOutcome::Blocked { .. } => {
            state.audit.record(AuditEvent::new(
                AuditEventType::IpBlocked,
                Severity::High,
                client.as_str(),
                path,
                json!({ "reason": "violation threshold reached", "trigger": reason, "blockSecs": block_secs }),
            ));
            metrics::record_blocked_clients(state.ip_guard.blocked_count());
        }
        ViolationOutcome::Counted(_) => {
            let audit_config = &state.config.audit;
            if audit_config.escalate_anomalies
                && state.audit.is_anomalous(client.as_str(), audit_config.anomaly_window_minutes)
            {
                state.audit.record(AuditEvent::new(
                    AuditEventType::SuspiciousActivity,
                    Severity::High,
                    client.as_str(),
                    path,
                    json!({ "trigger": reason, "windowMinutes": audit_config.anomaly_window_minutes }),
                ));
                state.ip_guard.block(client.as_str(), "anomalous activity");
                state.audit.record(AuditEvent::new(
                    AuditEventType::IpBlocked,
                    Severity::High,
                    client.as_str(),
                    path,
                    json!({ "reason": "anomalous activity", "trigger": reason, "blockSecs": block_secs }),
                ));
                metrics::record_blocked_clients(state.ip_guard.blocked_count());
            }
        }
    }
}
