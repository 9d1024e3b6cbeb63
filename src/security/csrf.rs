//! Stateless anti-forgery tokens.
//!
//! A token is `value.signature` where `value` is 32 random bytes (hex) and
//! `signature` is the hex HMAC-SHA256 of `value` under the server secret.
//! Nothing is stored server-side. The token is handed out once per session in
//! an HttpOnly cookie and must be echoed back in a header on every
//! state-changing request (double submit): the header must verify and equal
//! the cookie.

use axum::http::{HeaderMap, Method, header};

use crate::config::CsrfConfig;
use crate::security::crypto::{constant_time_eq, hmac_sha256_hex, random_hex};

/// Why a state-changing request failed the CSRF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfFailure {
    MissingHeader,
    MissingCookie,
    InvalidSignature,
    CookieMismatch,
}

impl std::fmt::Display for CsrfFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            CsrfFailure::MissingHeader => "CSRF token header missing",
            CsrfFailure::MissingCookie => "CSRF cookie missing",
            CsrfFailure::InvalidSignature => "CSRF token signature invalid",
            CsrfFailure::CookieMismatch => "CSRF token does not match cookie",
        };
        f.write_str(msg)
    }
}

pub struct CsrfGuard {
    secret: Vec<u8>,
    enabled: bool,
    cookie_name: String,
    header_name: String,
    cookie_secure: bool,
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("enabled", &self.enabled)
            .field("cookie_name", &self.cookie_name)
            .field("header_name", &self.header_name)
            .finish_non_exhaustive()
    }
}

impl CsrfGuard {
    pub fn new(config: &CsrfConfig) -> Self {
        let secret = if config.secret.is_empty() {
            tracing::warn!("csrf.secret not set, generating an ephemeral secret; tokens will not survive restarts");
            random_hex(32).into_bytes()
        } else {
            config.secret.as_bytes().to_vec()
        };

        Self {
            secret,
            enabled: config.enabled,
            cookie_name: config.cookie_name.clone(),
            header_name: config.header_name.to_ascii_lowercase(),
            cookie_secure: config.cookie_secure,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Mint a new signed token.
    pub fn issue(&self) -> String {
        let value = random_hex(32);
        let signature = hmac_sha256_hex(&self.secret, value.as_bytes());
        format!("{}.{}", value, signature)
    }

    /// True iff the signature part is exactly the HMAC of the value part.
    pub fn verify(&self, token: &str) -> bool {
        let Some((value, signature)) = token.split_once('.') else {
            return false;
        };
        if value.is_empty() || signature.is_empty() {
            return false;
        }
        let expected = hmac_sha256_hex(&self.secret, value.as_bytes());
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    /// Check a request. Safe methods and a disabled guard always pass.
    pub fn validate(&self, method: &Method, headers: &HeaderMap) -> Result<(), CsrfFailure> {
        if !self.enabled || is_safe_method(method) {
            return Ok(());
        }

        let submitted = headers
            .get(self.header_name.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(CsrfFailure::MissingHeader)?;

        if !self.verify(submitted) {
            return Err(CsrfFailure::InvalidSignature);
        }

        let cookie = cookie_value(headers, &self.cookie_name).ok_or(CsrfFailure::MissingCookie)?;
        if !constant_time_eq(cookie.as_bytes(), submitted.as_bytes()) {
            return Err(CsrfFailure::CookieMismatch);
        }

        Ok(())
    }

    /// `Set-Cookie` value delivering `token`.
    pub fn cookie_header(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict",
            self.cookie_name, token
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Value of cookie `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn guard() -> CsrfGuard {
        CsrfGuard::new(&CsrfConfig {
            secret: "test-secret".into(),
            ..CsrfConfig::default()
        })
    }

    fn headers_with(token: &str, cookie: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-csrf-token", HeaderValue::from_str(token).unwrap());
        if let Some(c) = cookie {
            headers.insert(
                header::COOKIE,
                HeaderValue::from_str(&format!("theme=dark; csrf_token={}", c)).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_issued_token_verifies() {
        let g = guard();
        let token = g.issue();
        assert!(g.verify(&token));
        assert_eq!(token.split('.').count(), 2);
    }

    #[test]
    fn test_single_character_mutation_fails() {
        let g = guard();
        let token = g.issue();
        for i in 0..token.len() {
            if token.as_bytes()[i] == b'.' {
                continue;
            }
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'a' { b'b' } else { b'a' };
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(!g.verify(&mutated), "mutation at {} accepted", i);

            let mut upper = token.clone().into_bytes();
            upper[i] = upper[i].to_ascii_uppercase();
            let upper = String::from_utf8(upper).unwrap();
            if upper != token {
                assert!(!g.verify(&upper), "case change at {} accepted", i);
            }
        }
    }

    #[test]
    fn test_other_secret_rejects() {
        let token = guard().issue();
        let other = CsrfGuard::new(&CsrfConfig {
            secret: "another-secret".into(),
            ..CsrfConfig::default()
        });
        assert!(!other.verify(&token));
        assert!(!other.verify("no-dot-here"));
        assert!(!other.verify("."));
    }

    #[test]
    fn test_validate_double_submit() {
        let g = guard();
        let token = g.issue();

        assert_eq!(g.validate(&Method::POST, &headers_with(&token, Some(&token))), Ok(()));
        assert_eq!(
            g.validate(&Method::POST, &headers_with(&token, None)),
            Err(CsrfFailure::MissingCookie)
        );
        let other = g.issue();
        assert_eq!(
            g.validate(&Method::POST, &headers_with(&token, Some(&other))),
            Err(CsrfFailure::CookieMismatch)
        );
        assert_eq!(
            g.validate(&Method::POST, &HeaderMap::new()),
            Err(CsrfFailure::MissingHeader)
        );
    }

    #[test]
    fn test_safe_methods_skip_check() {
        let g = guard();
        assert!(g.validate(&Method::GET, &HeaderMap::new()).is_ok());
        assert!(g.validate(&Method::OPTIONS, &HeaderMap::new()).is_ok());
        assert!(g.validate(&Method::DELETE, &HeaderMap::new()).is_err());
    }

    #[test]
    fn test_cookie_header_attributes() {
        let g = CsrfGuard::new(&CsrfConfig {
            secret: "s".into(),
            cookie_secure: true,
            ..CsrfConfig::default()
        });
        let cookie = g.cookie_header("abc.def");
        assert!(cookie.starts_with("csrf_token=abc.def;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.ends_with("; Secure"));
    }
}
