//! Transient-failure classification and backoff, shared by both adapter variants.

use std::time::Duration;

const TRANSIENT_PATTERNS: &[&str] = &[
    "503",
    "overload",
    "over capacity",
    "too many requests",
    "429",
    "rate limit",
    "temporarily unavailable",
    "service unavailable",
    "connection reset",
    "connection refused",
];

/// Whether stderr (or an HTTP error body) looks like a transient provider hiccup
/// worth retrying, per the small fixed pattern set in the backend contract.
pub fn is_transient_message(text: &str) -> bool {
    let lower = text.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

pub fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status.as_u16() == 429
}

/// `2^attempt` seconds, per the retry policy in the backend contract.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_transient_patterns() {
        assert!(is_transient_message("Error: 503 Service Unavailable"));
        assert!(is_transient_message("rate limit exceeded, try again"));
        assert!(is_transient_message("connection reset by peer"));
    }

    #[test]
    fn does_not_flag_unrelated_errors() {
        assert!(!is_transient_message("invalid API key"));
        assert!(!is_transient_message("model not found"));
    }

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
    }
}
