//! Request shape and size ceilings.
//!
//! # Responsibilities
//! - Reject empty, oversized or control-character-laden prompts
//! - Normalize the requested backend list (trim, dedup, cap)
//!
//! # Design Decisions
//! - Body size is enforced earlier by `RequestBodyLimitLayer`; these checks run
//!   on the decoded payload
//! - Prompt length is measured in characters, not bytes
//! - Validation errors are reported verbatim to the caller

use std::collections::HashSet;

use crate::config::LimitsConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("prompt is {actual} characters, maximum is {max}")]
    PromptTooLong { max: usize, actual: usize },
    #[error("prompt contains control characters")]
    ControlCharacters,
    #[error("at least one backend must be selected")]
    NoBackends,
    #[error("{actual} backends requested, maximum is {max}")]
    TooManyBackends { max: usize, actual: usize },
    #[error("backend id must not be empty")]
    EmptyBackendId,
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),
    #[error("input rejected by content filter: {0}")]
    Malicious(String),
}

/// Tab, newline and carriage return are allowed; every other control character is not.
fn is_forbidden_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\r' | '\t')
}

pub fn validate_prompt(prompt: &str, limits: &LimitsConfig) -> Result<(), InputError> {
    if prompt.trim().is_empty() {
        return Err(InputError::EmptyPrompt);
    }
    let actual = prompt.chars().count();
    if actual > limits.max_prompt_length {
        return Err(InputError::PromptTooLong {
            max: limits.max_prompt_length,
            actual,
        });
    }
    if prompt.chars().any(is_forbidden_control) {
        return Err(InputError::ControlCharacters);
    }
    Ok(())
}

/// Trimmed, deduplicated backend ids in first-seen order.
pub fn normalize_backend_ids(ids: &[String], limits: &LimitsConfig) -> Result<Vec<String>, InputError> {
    if ids.is_empty() {
        return Err(InputError::NoBackends);
    }

    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            return Err(InputError::EmptyBackendId);
        }
        if seen.insert(id.to_string()) {
            normalized.push(id.to_string());
        }
    }

    if normalized.len() > limits.max_backends_per_request {
        return Err(InputError::TooManyBackends {
            max: limits.max_backends_per_request,
            actual: normalized.len(),
        });
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_prompt_length: 10,
            max_backends_per_request: 2,
            ..LimitsConfig::default()
        }
    }

    #[test]
    fn test_prompt_rules() {
        let l = limits();
        assert!(validate_prompt("2+2?", &l).is_ok());
        assert!(validate_prompt("a\tb\nc", &l).is_ok());
        assert_eq!(validate_prompt("  ", &l), Err(InputError::EmptyPrompt));
        assert_eq!(
            validate_prompt("abcdefghijk", &l),
            Err(InputError::PromptTooLong { max: 10, actual: 11 })
        );
        assert_eq!(validate_prompt("a\u{0007}b", &l), Err(InputError::ControlCharacters));
    }

    #[test]
    fn test_length_counts_characters() {
        assert!(validate_prompt("éééééééééé", &limits()).is_ok());
    }

    #[test]
    fn test_backend_ids_deduplicated_in_order() {
        let ids = vec!["y".to_string(), " x ".to_string(), "y".to_string()];
        assert_eq!(normalize_backend_ids(&ids, &limits()).unwrap(), vec!["y", "x"]);
    }

    #[test]
    fn test_backend_id_rules() {
        let l = limits();
        assert_eq!(normalize_backend_ids(&[], &l), Err(InputError::NoBackends));
        assert_eq!(
            normalize_backend_ids(&["".to_string()], &l),
            Err(InputError::EmptyBackendId)
        );
        let many: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            normalize_backend_ids(&many, &l),
            Err(InputError::TooManyBackends { max: 2, actual: 3 })
        );
    }
}
