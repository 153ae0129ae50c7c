//! Error taxonomy and classification for provider failures.
//!
//! Two boundaries get typed errors: configuration (`ConfigError`) and
//! provider attempts (`ProviderError`, carrying an [`ErrorType`]). Every
//! other internal failure is classified into one of these before it's
//! recorded on an [`crate::AttemptRecord`].

use std::time::Duration;

/// Coarse classification of a provider attempt failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Timeout,
    Quota,
    Auth,
    Transient,
    Unsupported,
    ServerDown,
    Unknown,
}

impl ErrorType {
    /// Whether this error type should trip the circuit breaker for the
    /// provider that raised it, ending the provider's retry loop outright
    /// rather than just exhausting keys or retries.
    pub fn is_structural_failure(self) -> bool {
        matches!(self, ErrorType::ServerDown | ErrorType::Unsupported)
    }

    /// Whether this error should mark the current account key in cooldown
    /// and move on to the next key instead of retrying with the same one.
    pub fn exhausts_key(self) -> bool {
        matches!(self, ErrorType::Quota | ErrorType::Auth)
    }
}

/// Base error for everything raised out of the orchestration path.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A provider-attempt failure, carrying its classification.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub error_type: ErrorType,
}

impl ProviderError {
    pub fn new(message: impl Into<String>, error_type: ErrorType) -> Self {
        Self { message: message.into(), error_type }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(message, ErrorType::Unknown)
    }
}

/// Configuration load/validation failure.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

const QUOTA_PATTERNS: &[&str] = &["quota", "rate limit", "too many requests"];
const AUTH_PATTERNS: &[&str] = &["unauthorized", "forbidden", "invalid api key"];
const TRANSIENT_PATTERNS: &[&str] = &["temporarily", "try again", "timeout"];
const UNSUPPORTED_PATTERNS: &[&str] = &["unsupported", "not implemented"];

/// Classify a free-text error message by substring match, case-insensitive.
/// Order matters: quota and auth outrank transient so a message like
/// "rate limit, try again later" classifies as quota, not transient.
pub fn classify_message(message: &str) -> ErrorType {
    if message.is_empty() {
        return ErrorType::Unknown;
    }
    let lower = message.to_lowercase();
    if QUOTA_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorType::Quota;
    }
    if AUTH_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorType::Auth;
    }
    if UNSUPPORTED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorType::Unsupported;
    }
    if TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorType::Transient;
    }
    ErrorType::Unknown
}

/// Classify an HTTP status code returned by a provider.
pub fn classify_status(status: u16) -> ErrorType {
    match status {
        401 | 403 => ErrorType::Auth,
        404 | 405 | 422 => ErrorType::Unsupported,
        429 => ErrorType::Quota,
        408 | 500 | 502 | 503 | 504 => ErrorType::Transient,
        s if s >= 500 => ErrorType::ServerDown,
        _ => ErrorType::Unknown,
    }
}

/// Classify a transport-level `reqwest` failure (no response received).
pub fn classify_transport(err: &reqwest::Error) -> ErrorType {
    if err.is_timeout() {
        ErrorType::Timeout
    } else if err.is_connect() || err.is_request() {
        ErrorType::ServerDown
    } else {
        ErrorType::Unknown
    }
}

/// Turn a `reqwest::Error` into a classified [`ProviderError`], preferring
/// the HTTP status code when one was received over transport-level
/// classification, and falling back to message-substring matching when
/// neither yields a definite answer.
pub fn classify_reqwest_error(err: reqwest::Error) -> ProviderError {
    let message = err.to_string();
    let mut error_type = err.status().map(|s| classify_status(s.as_u16())).unwrap_or_else(|| classify_transport(&err));
    if error_type == ErrorType::Unknown {
        error_type = classify_message(&message);
    }
    ProviderError::new(message, error_type)
}

/// Backoff delay for a retry attempt, per the original formula:
/// `backoff_s * (attempt_index + 1)`, zero-indexed.
pub fn retry_backoff(backoff_s: u64, attempt_index: u32) -> Duration {
    Duration::from_secs(backoff_s * u64::from(attempt_index + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_message_prefers_quota_over_transient() {
        assert_eq!(classify_message("rate limit exceeded, try again later"), ErrorType::Quota);
    }

    #[test]
    fn classify_message_auth_patterns() {
        assert_eq!(classify_message("Unauthorized: invalid api key"), ErrorType::Auth);
        assert_eq!(classify_message("Forbidden"), ErrorType::Auth);
    }

    #[test]
    fn classify_message_transient_patterns() {
        assert_eq!(classify_message("connection timeout"), ErrorType::Transient);
        assert_eq!(classify_message("service temporarily unavailable"), ErrorType::Transient);
    }

    #[test]
    fn classify_message_unsupported_patterns() {
        assert_eq!(classify_message("feature not implemented"), ErrorType::Unsupported);
    }

    #[test]
    fn classify_message_unknown_for_empty_or_unmatched() {
        assert_eq!(classify_message(""), ErrorType::Unknown);
        assert_eq!(classify_message("something went wrong"), ErrorType::Unknown);
    }

    #[test]
    fn classify_status_mappings() {
        assert_eq!(classify_status(401), ErrorType::Auth);
        assert_eq!(classify_status(403), ErrorType::Auth);
        assert_eq!(classify_status(404), ErrorType::Unsupported);
        assert_eq!(classify_status(422), ErrorType::Unsupported);
        assert_eq!(classify_status(429), ErrorType::Quota);
        assert_eq!(classify_status(500), ErrorType::Transient);
        assert_eq!(classify_status(503), ErrorType::Transient);
        assert_eq!(classify_status(200), ErrorType::Unknown);
    }

    #[test]
    fn structural_failure_variants() {
        assert!(ErrorType::ServerDown.is_structural_failure());
        assert!(ErrorType::Unsupported.is_structural_failure());
        assert!(!ErrorType::Transient.is_structural_failure());
    }

    #[test]
    fn exhausts_key_variants() {
        assert!(ErrorType::Quota.exhausts_key());
        assert!(ErrorType::Auth.exhausts_key());
        assert!(!ErrorType::Timeout.exhausts_key());
    }

    #[test]
    fn retry_backoff_scales_by_attempt_index() {
        assert_eq!(retry_backoff(2, 0), Duration::from_secs(2));
        assert_eq!(retry_backoff(2, 1), Duration::from_secs(4));
        assert_eq!(retry_backoff(2, 2), Duration::from_secs(6));
    }
}
