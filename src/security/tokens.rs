//! Scoped bearer tokens for programmatic callers.
//!
//! # Responsibilities
//! - Mint high-entropy tokens (`fgw_` + 64 hex chars)
//! - Keep only a keyed hash of each token; the plaintext leaves once, at issuance
//! - Verify presented tokens against every stored hash in constant time
//! - Revoke by id and list token metadata without secret material
//!
//! # Design Decisions
//! - The hash key comes from `admin.token_hash_key`; when unset an ephemeral key
//!   is generated and tokens do not survive restarts
//! - Expired tokens fail verification even on a hash match

use std::collections::BTreeSet;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AdminConfig;
use crate::security::crypto::{constant_time_eq, hmac_sha256_hex, random_hex};

pub const TOKEN_PREFIX: &str = "fgw_";

/// Permission granted to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Read,
    Write,
    Dispatch,
    Admin,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Read, Scope::Write, Scope::Dispatch, Scope::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
            Scope::Dispatch => "dispatch",
            Scope::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Scope::Read),
            "write" => Ok(Scope::Write),
            "dispatch" => Ok(Scope::Dispatch),
            "admin" => Ok(Scope::Admin),
            other => Err(TokenError::UnknownScope(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token name must not be empty")]
    EmptyName,
    #[error("at least one scope is required")]
    NoScopes,
    #[error("unknown scope '{0}'")]
    UnknownScope(String),
    #[error("expiry must be at least one day")]
    InvalidExpiry,
}

/// Stored token record. Holds the keyed hash, never the plaintext.
#[derive(Debug, Clone)]
struct TokenRecord {
    id: Uuid,
    name: String,
    scopes: BTreeSet<Scope>,
    token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
}

/// Returned exactly once, at issuance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Token metadata safe to list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub id: Uuid,
    pub name: String,
    pub scopes: Vec<Scope>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<&TokenRecord> for TokenInfo {
    fn from(record: &TokenRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            scopes: record.scopes.iter().copied().collect(),
            created_at: record.created_at,
            expires_at: record.expires_at,
            last_used_at: record.last_used_at,
        }
    }
}

/// A successfully verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub id: Uuid,
    pub name: String,
    pub scopes: BTreeSet<Scope>,
}

impl VerifiedToken {
    /// True when the token was granted every scope in `required`.
    pub fn has_scopes(&self, required: &[Scope]) -> bool {
        has_scopes(&self.scopes, required)
    }
}

pub fn has_scopes(granted: &BTreeSet<Scope>, required: &[Scope]) -> bool {
    required.iter().all(|s| granted.contains(s))
}

pub struct TokenIssuer {
    tokens: DashMap<Uuid, TokenRecord>,
    hash_key: Vec<u8>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("tokens", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: &AdminConfig) -> Self {
        let hash_key = if config.token_hash_key.is_empty() {
            tracing::warn!("admin.token_hash_key not set, generating an ephemeral key; issued tokens will not survive restarts");
            random_hex(32).into_bytes()
        } else {
            config.token_hash_key.as_bytes().to_vec()
        };

        Self {
            tokens: DashMap::new(),
            hash_key,
        }
    }

    fn hash(&self, token: &str) -> String {
        hmac_sha256_hex(&self.hash_key, token.as_bytes())
    }

    pub fn issue(
        &self,
        name: &str,
        scopes: &[Scope],
        expiry_days: Option<u32>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(name, scopes, expiry_days, Utc::now())
    }

    pub fn issue_at(
        &self,
        name: &str,
        scopes: &[Scope],
        expiry_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TokenError::EmptyName);
        }
        if scopes.is_empty() {
            return Err(TokenError::NoScopes);
        }
        let expires_at = match expiry_days {
            Some(0) => return Err(TokenError::InvalidExpiry),
            Some(days) => Some(now + ChronoDuration::days(i64::from(days))),
            None => None,
        };

        let token = format!("{}{}", TOKEN_PREFIX, random_hex(32));
        let record = TokenRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            scopes: scopes.iter().copied().collect(),
            token_hash: self.hash(&token),
            created_at: now,
            expires_at,
            last_used_at: None,
        };

        let issued = IssuedToken {
            id: record.id,
            token,
            created_at: record.created_at,
            expires_at: record.expires_at,
        };

        tracing::info!(
            token_id = %record.id,
            name = %record.name,
            scopes = ?record.scopes,
            expires_at = ?record.expires_at,
            "API token issued"
        );
        self.tokens.insert(record.id, record);
        Ok(issued)
    }

    /// Verify a presented token. `None` for unknown, malformed or expired tokens.
    pub fn verify(&self, token: &str) -> Option<VerifiedToken> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<VerifiedToken> {
        if !token.starts_with(TOKEN_PREFIX) {
            return None;
        }
        let presented = self.hash(token);

        // Compare against every record so timing does not depend on which one matches.
        let mut matched: Option<Uuid> = None;
        for record in self.tokens.iter() {
            if constant_time_eq(record.token_hash.as_bytes(), presented.as_bytes()) {
                matched = Some(record.id);
            }
        }

        let id = matched?;
        let mut record = self.tokens.get_mut(&id)?;
        if record.expires_at.is_some_and(|exp| now >= exp) {
            tracing::debug!(token_id = %id, "Rejected expired token");
            return None;
        }
        record.last_used_at = Some(now);

        Some(VerifiedToken {
            id: record.id,
            name: record.name.clone(),
            scopes: record.scopes.clone(),
        })
    }

    /// Remove a token. Returns whether it existed.
    pub fn revoke(&self, id: &Uuid) -> bool {
        let removed = self.tokens.remove(id).is_some();
        if removed {
            tracing::info!(token_id = %id, "API token revoked");
        }
        removed
    }

    /// All tokens, oldest first, without secret material.
    pub fn list(&self) -> Vec<TokenInfo> {
        let mut infos: Vec<TokenInfo> = self.tokens.iter().map(|r| TokenInfo::from(r.value())).collect();
        infos.sort_by_key(|t| t.created_at);
        infos
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AdminConfig {
            token_hash_key: "hash-key".into(),
            ..AdminConfig::default()
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let issued = issuer.issue("ci", &[Scope::Dispatch, Scope::Read], None).unwrap();
        assert!(issued.token.starts_with("fgw_"));
        assert_eq!(issued.token.len(), 4 + 64);
        assert!(issued.expires_at.is_none());

        let verified = issuer.verify(&issued.token).unwrap();
        assert_eq!(verified.id, issued.id);
        assert!(verified.has_scopes(&[Scope::Dispatch]));
        assert!(verified.has_scopes(&[Scope::Read, Scope::Dispatch]));
        assert!(!verified.has_scopes(&[Scope::Admin]));
    }

    #[test]
    fn test_plaintext_not_retained() {
        let issuer = issuer();
        let issued = issuer.issue("ci", &[Scope::Read], None).unwrap();
        let record = issuer.tokens.get(&issued.id).unwrap();
        assert_ne!(record.token_hash, issued.token);
        assert!(!record.token_hash.contains(&issued.token[4..]));
    }

    #[test]
    fn test_unknown_and_mutated_tokens_rejected() {
        let issuer = issuer();
        let issued = issuer.issue("ci", &[Scope::Read], None).unwrap();
        assert!(issuer.verify("fgw_deadbeef").is_none());
        assert!(issuer.verify("not-a-token").is_none());

        let mut mutated = issued.token.clone();
        let last = mutated.pop().unwrap();
        mutated.push(if last == '0' { '1' } else { '0' });
        assert!(issuer.verify(&mutated).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let issued = issuer.issue_at("short", &[Scope::Read], Some(1), now).unwrap();
        assert_eq!(issued.expires_at, Some(now + ChronoDuration::days(1)));

        assert!(issuer.verify_at(&issued.token, now + ChronoDuration::hours(23)).is_some());
        assert!(issuer.verify_at(&issued.token, now + ChronoDuration::days(1)).is_none());
    }

    #[test]
    fn test_revoke() {
        let issuer = issuer();
        let issued = issuer.issue("ci", &[Scope::Write], None).unwrap();
        assert!(issuer.revoke(&issued.id));
        assert!(!issuer.revoke(&issued.id));
        assert!(issuer.verify(&issued.token).is_none());
    }

    #[test]
    fn test_list_tracks_last_use() {
        let issuer = issuer();
        let a = issuer.issue("a", &[Scope::Read], None).unwrap();
        issuer.issue("b", &[Scope::Admin], Some(30)).unwrap();

        assert!(issuer.list().iter().all(|t| t.last_used_at.is_none()));
        issuer.verify(&a.token).unwrap();
        let listed = issuer.list();
        assert_eq!(listed.len(), 2);
        let a_info = listed.iter().find(|t| t.id == a.id).unwrap();
        assert!(a_info.last_used_at.is_some());
    }

    #[test]
    fn test_issue_validation() {
        let issuer = issuer();
        assert_eq!(issuer.issue(" ", &[Scope::Read], None).unwrap_err(), TokenError::EmptyName);
        assert_eq!(issuer.issue("x", &[], None).unwrap_err(), TokenError::NoScopes);
        assert_eq!(issuer.issue("x", &[Scope::Read], Some(0)).unwrap_err(), TokenError::InvalidExpiry);
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("Dispatch".parse::<Scope>().unwrap(), Scope::Dispatch);
        assert!(matches!("root".parse::<Scope>(), Err(TokenError::UnknownScope(_))));
    }
}
