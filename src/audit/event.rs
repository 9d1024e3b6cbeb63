//! Audit event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditEventType {
    RateLimitExceeded,
    CsrfFailure,
    InvalidInput,
    ApiKeyUsage,
    IpBlocked,
    SuspiciousActivity,
    AuthFailure,
    Error,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 8] = [
        AuditEventType::RateLimitExceeded,
        AuditEventType::CsrfFailure,
        AuditEventType::InvalidInput,
        AuditEventType::ApiKeyUsage,
        AuditEventType::IpBlocked,
        AuditEventType::SuspiciousActivity,
        AuditEventType::AuthFailure,
        AuditEventType::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::RateLimitExceeded => "rate-limit-exceeded",
            AuditEventType::CsrfFailure => "csrf-failure",
            AuditEventType::InvalidInput => "invalid-input",
            AuditEventType::ApiKeyUsage => "api-key-usage",
            AuditEventType::IpBlocked => "ip-blocked",
            AuditEventType::SuspiciousActivity => "suspicious-activity",
            AuditEventType::AuthFailure => "auth-failure",
            AuditEventType::Error => "error",
        }
    }
}

impl std::str::FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One journal entry. Never mutated after insertion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: Severity,
    pub client: String,
    pub path: String,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        severity: Severity,
        client: impl Into<String>,
        path: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            severity,
            client: client.into(),
            path: path.into(),
            details,
        }
    }

    /// Override the timestamp (tests and replay).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Filters for [`crate::audit::AuditLog::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditQuery {
    pub event_type: Option<AuditEventType>,
    pub min_severity: Option<Severity>,
    pub client: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.event_type.is_none_or(|t| t == event.event_type)
            && self.min_severity.is_none_or(|s| event.severity >= s)
            && self.client.as_deref().is_none_or(|c| c == event.client)
            && self.since.is_none_or(|since| event.timestamp >= since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_names() {
        let json = serde_json::to_string(&AuditEventType::RateLimitExceeded).unwrap();
        assert_eq!(json, "\"rate-limit-exceeded\"");
        for t in AuditEventType::ALL {
            assert_eq!(t.as_str().parse::<AuditEventType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), t.as_str());
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_query_matching() {
        let event = AuditEvent::new(
            AuditEventType::CsrfFailure,
            Severity::Medium,
            "1.2.3.4",
            "/api/dispatch",
            serde_json::json!({}),
        );
        assert!(AuditQuery::default().matches(&event));
        assert!(AuditQuery { min_severity: Some(Severity::Medium), ..Default::default() }.matches(&event));
        assert!(!AuditQuery { min_severity: Some(Severity::High), ..Default::default() }.matches(&event));
        assert!(!AuditQuery { client: Some("5.6.7.8".into()), ..Default::default() }.matches(&event));
        assert!(!AuditQuery { event_type: Some(AuditEventType::Error), ..Default::default() }.matches(&event));
    }
}
