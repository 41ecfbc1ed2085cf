//! Runtime configuration
//!
//! Plain structs with defaults; the CLI fills them from its arguments.

use std::time::Duration;

/// Default lifetime of the in-progress marker
pub const DEFAULT_IN_PROGRESS_TTL: Duration = Duration::from_secs(60);

/// Default lifetime of a cached outcome
pub const DEFAULT_OUTCOME_TTL: Duration = Duration::from_secs(60 * 60);

/// Idempotency coordinator settings
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Expiry of the `IN_PROGRESS` marker
    ///
    /// Recovers keys held by crashed workers. An operation that runs longer
    /// than this can be started a second time by another caller.
    pub in_progress_ttl: Duration,

    /// Expiry of a cached outcome
    pub outcome_ttl: Duration,

    /// Prefix of every cache key
    pub key_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            in_progress_ttl: DEFAULT_IN_PROGRESS_TTL,
            outcome_ttl: DEFAULT_OUTCOME_TTL,
            key_prefix: "idempotency:".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Build a config with custom expiries; zero durations fall back to defaults
    pub fn with_ttls(in_progress_ttl: Duration, outcome_ttl: Duration) -> Self {
        let default = Self::default();
        Self {
            in_progress_ttl: if in_progress_ttl.is_zero() {
                tracing::warn!(
                    "Invalid in_progress_ttl (0s), using default ({}s)",
                    default.in_progress_ttl.as_secs()
                );
                default.in_progress_ttl
            } else {
                in_progress_ttl
            },
            outcome_ttl: if outcome_ttl.is_zero() {
                tracing::warn!(
                    "Invalid outcome_ttl (0s), using default ({}s)",
                    default.outcome_ttl.as_secs()
                );
                default.outcome_ttl
            } else {
                outcome_ttl
            },
            key_prefix: default.key_prefix,
        }
    }

    /// Cache key for an idempotency key
    pub fn cache_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.in_progress_ttl, Duration::from_secs(60));
        assert_eq!(config.outcome_ttl, Duration::from_secs(3600));
        assert_eq!(config.cache_key("d1"), "idempotency:d1");
    }

    #[rstest]
    #[case::custom(5, 10, 5, 10)]
    #[case::zero_in_progress(0, 10, 60, 10)]
    #[case::zero_outcome(5, 0, 5, 3600)]
    fn test_with_ttls(
        #[case] in_progress: u64,
        #[case] outcome: u64,
        #[case] expected_in_progress: u64,
        #[case] expected_outcome: u64,
    ) {
        let config = LedgerConfig::with_ttls(
            Duration::from_secs(in_progress),
            Duration::from_secs(outcome),
        );
        assert_eq!(config.in_progress_ttl.as_secs(), expected_in_progress);
        assert_eq!(config.outcome_ttl.as_secs(), expected_outcome);
    }
}
