//! Error taxonomy.
//!
//! Only `ScoringError::InvalidInput` ever reaches a caller of the scoring
//! facade. Data-source and calculation problems are absorbed and surfaced as
//! confidence and warnings on the `ScoringResult`.

use thiserror::Error;

/// Errors surfaced to callers building a `ScoringContext` or `ScoringItem`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("invalid input `{field}`: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

impl ScoringError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure of a single astronomical data-source tier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl SourceError {
    /// Retryable failures move the chain on to the next tier.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::InvalidTimestamp(_))
    }
}

/// Outcome of a chain that produced no positions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("source `{source_name}` rejected the request: {error}")]
    Rejected {
        source_name: &'static str,
        error: SourceError,
    },
    #[error("all {} astronomical sources failed", failures.len())]
    Exhausted { failures: Vec<String> },
}

/// Problems loading or validating coefficient tables / service settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("failed to parse tables: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_timestamp_is_fatal() {
        assert!(SourceError::Timeout(2000).is_retryable());
        assert!(SourceError::Unavailable("down".into()).is_retryable());
        assert!(SourceError::Malformed("eof".into()).is_retryable());
        assert!(!SourceError::InvalidTimestamp("year 1200".into()).is_retryable());
    }

    #[test]
    fn invalid_input_message_names_field() {
        let e = ScoringError::invalid("elements", "sum is 1.4");
        assert_eq!(e.to_string(), "invalid input `elements`: sum is 1.4");
    }
}
