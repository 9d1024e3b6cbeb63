//! Backend failure taxonomy and secret redaction.
//!
//! Each failure carries a stable, user-safe message chosen by its kind and a
//! separate technical detail for diagnostics. Technical detail is always
//! redacted before it is stored on the error.

use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const REDACTED: &str = "[REDACTED]";
const MAX_DETAIL_BODY: usize = 500;
/// Shorter known secrets are not worth redacting and would mangle ordinary text.
const MIN_SECRET_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    Authentication,
    RateLimited,
    Timeout,
    EmptyResponse,
    Transport,
    Unsupported,
}

impl BackendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendErrorKind::Authentication => "authentication",
            BackendErrorKind::RateLimited => "rate_limited",
            BackendErrorKind::Timeout => "timeout",
            BackendErrorKind::EmptyResponse => "empty_response",
            BackendErrorKind::Transport => "transport",
            BackendErrorKind::Unsupported => "unsupported",
        }
    }

    /// Stable message shown to callers.
    pub fn user_message(&self) -> &'static str {
        match self {
            BackendErrorKind::Authentication => {
                "Invalid API key or insufficient permissions for this backend."
            }
            BackendErrorKind::RateLimited => {
                "The backend rate limit or quota was exceeded. Try again later."
            }
            BackendErrorKind::Timeout => "The backend did not respond in time.",
            BackendErrorKind::EmptyResponse => {
                "The backend returned an empty or blocked response."
            }
            BackendErrorKind::Transport => "The backend request failed.",
            BackendErrorKind::Unsupported => "This backend does not support the operation.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .kind.user_message())]
pub struct BackendError {
    pub kind: BackendErrorKind,
    /// Redacted diagnostic detail.
    pub technical: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, technical: impl Into<String>) -> Self {
        Self {
            kind,
            technical: redact(&technical.into(), &[]),
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }

    /// Apply a further redaction pass with the caller's known secrets.
    pub fn redacted_with(mut self, secrets: &[&str]) -> Self {
        self.technical = redact(&self.technical, secrets);
        self
    }
}

fn generic_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+", "${1}[REDACTED]"),
            (r"\bsk-[A-Za-z0-9_-]{8,}", "[REDACTED]"),
            (r"(?i)\b((?:api_?)?key=)[^&\s]+", "${1}[REDACTED]"),
        ]
        .into_iter()
        .filter_map(|(p, replacement)| Regex::new(p).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Replace every known secret and anything that looks like a credential with [`REDACTED`].
pub fn redact(text: &str, secrets: &[&str]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if secret.len() >= MIN_SECRET_LEN {
            out = out.replace(secret, REDACTED);
        }
    }
    for (re, replacement) in generic_patterns() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out
}

/// Cut `text` to at most 500 characters, marking the cut.
pub fn truncate_detail(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_BODY {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_DETAIL_BODY).collect();
    cut.push_str("…[truncated]");
    cut
}
