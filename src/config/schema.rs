//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, concurrency cap).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Static access lists and violation-driven blocking.
    pub ip_guard: IpGuardConfig,

    /// Anti-forgery token and origin checks.
    pub csrf: CsrfConfig,

    /// Security event journal.
    pub audit: AuditConfig,

    /// Request size and shape ceilings.
    pub limits: LimitsConfig,

    /// Generation backend definitions.
    pub backends: Vec<BackendConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum requests in flight across all clients (backpressure).
    pub max_concurrent_requests: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_concurrent_requests: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall ceiling for one inbound request in seconds.
    pub request_secs: u64,

    /// Ceiling for each individual backend call in seconds.
    pub backend_call_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 600,
            backend_call_secs: 600,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Requests allowed per client per window.
    pub max_requests: u32,

    /// How often expired windows are swept, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 10,
            sweep_interval_secs: 60,
        }
    }
}

/// IP reputation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IpGuardConfig {
    /// When non-empty, only these client identifiers are admitted.
    pub whitelist: Vec<String>,

    /// Client identifiers that are always rejected.
    pub blacklist: Vec<String>,

    /// Violations that convert into a timed block.
    pub max_violations_before_block: u32,

    /// Length of a dynamic block in seconds.
    pub block_duration_secs: u64,

    /// How often expired blocks are swept, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for IpGuardConfig {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            max_violations_before_block: 5,
            block_duration_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

/// CSRF and origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Enforce anti-forgery tokens on state-changing requests.
    pub enabled: bool,

    /// HMAC secret. A random one is generated at startup when empty.
    pub secret: String,

    /// Cookie carrying the issued token.
    pub cookie_name: String,

    /// Header the client echoes the token back in.
    pub header_name: String,

    /// Add the `Secure` attribute to the token cookie.
    pub cookie_secure: bool,

    /// Origins accepted in addition to same-origin and local-network hosts.
    pub allowed_origins: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: String::new(),
            cookie_name: "csrf_token".to_string(),
            header_name: "x-csrf-token".to_string(),
            cookie_secure: false,
            allowed_origins: Vec::new(),
        }
    }
}

/// Audit journal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Record security events.
    pub enabled: bool,

    /// Ring buffer capacity; oldest events are evicted beyond it.
    pub capacity: usize,

    /// Trailing window used by the anomaly heuristic.
    pub anomaly_window_minutes: i64,

    /// Block a client as soon as the anomaly heuristic flags it.
    pub escalate_anomalies: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            anomaly_window_minutes: 15,
            escalate_anomalies: true,
        }
    }
}

/// Request size and shape ceilings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Maximum prompt length in characters.
    pub max_prompt_length: usize,

    /// Maximum number of backends in one dispatch.
    pub max_backends_per_request: usize,

    /// Length above which text is flagged as an oversized payload.
    pub max_payload_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            max_prompt_length: 10_000,
            max_backends_per_request: 10,
            max_payload_length: 100_000,
        }
    }
}

/// Generation backend definition (OpenAI-compatible chat completion API).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier used by clients.
    pub id: String,

    /// Human-readable provider name.
    pub display_name: String,

    /// API base URL, e.g. "https://api.openai.com/v1".
    pub base_url: String,

    /// Model used when the client does not override it.
    pub default_model: String,

    /// Whether a call without a credential is refused.
    #[serde(default = "default_requires_secret")]
    pub requires_secret: bool,

    /// Environment variable holding the server-side credential.
    /// Defaults to `<ID>_API_KEY`.
    #[serde(default)]
    pub secret_env: Option<String>,

    /// Sampling temperature sent with every generation call.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional completion token cap.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl BackendConfig {
    /// Name of the environment variable holding this backend's secret.
    pub fn secret_env_var(&self) -> String {
        self.secret_env.clone().unwrap_or_else(|| {
            format!("{}_API_KEY", self.id.to_uppercase().replace('-', "_"))
        })
    }
}

fn default_requires_secret() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin routes.
    pub enabled: bool,

    /// Bootstrap key (Bearer) granting every scope. Empty disables it.
    pub api_key: String,

    /// Key for hashing issued tokens. A random one is generated when empty.
    pub token_hash_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            token_hash_key: String::new(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,
    /// Derive the client identifier from X-Forwarded-For / X-Real-IP.
    pub trust_forwarded_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            trust_forwarded_headers: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.ip_guard.max_violations_before_block, 5);
        assert_eq!(config.ip_guard.block_duration_secs, 3600);
        assert_eq!(config.timeouts.backend_call_secs, 600);
        assert_eq!(config.timeouts.request_secs, 600);
    }

    #[test]
    fn test_minimal_toml_backend() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[backends]]
            id = "open-ai"
            display_name = "OpenAI"
            base_url = "https://api.openai.com/v1"
            default_model = "gpt-4o-mini"
            "#,
        )
        .unwrap();

        let backend = &config.backends[0];
        assert!(backend.requires_secret);
        assert_eq!(backend.secret_env_var(), "OPEN_AI_API_KEY");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
