//! Error types for the Sieve triage core.
//!
//! Uses `thiserror` for public API error types. Configuration errors are fatal;
//! source and tracker errors are recovered locally by the pipeline and surface
//! as outcome values instead.

use crate::secret_ref::SecretResolveError;

/// Result type alias for Sieve operations.
pub type Result<T> = std::result::Result<T, SieveError>;

/// Top-level error type for the Sieve core library.
#[derive(Debug, thiserror::Error)]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Alert source error: {0}")]
    Source(#[from] SourceError),

    #[error("Ticket tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {message}")]
    Load { message: String },

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] SecretResolveError),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load {
            message: e.to_string(),
        }
    }
}

/// Errors from alert retrieval against a search backend.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Request to {backend} failed: {message}")]
    Request { backend: String, message: String },

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed backend response: {message}")]
    Parse { message: String },

    #[error("Search job ended in state '{state}'")]
    SearchFailed { state: String },

    #[error("Search job did not complete within {waited_secs}s")]
    Timeout { waited_secs: u64 },
}

/// Errors from ticket creation against an issue tracker.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Tracker request failed: {message}")]
    Request { message: String },

    #[error("Tracker rejected the issue (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed tracker response: {message}")]
    Parse { message: String },
}

/// Truncate a response body for inclusion in an error message.
pub fn body_excerpt(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("classifier.threshold", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid value for 'classifier.threshold': must be at least 1"
        );
    }

    #[test]
    fn test_source_error_wraps_into_sieve_error() {
        let err: SieveError = SourceError::Status {
            status: 503,
            body: "unavailable".into(),
        }
        .into();
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_body_excerpt_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let excerpt = body_excerpt(&long);
        assert_eq!(excerpt.len(), 303);
        assert!(excerpt.ends_with("..."));
        assert_eq!(body_excerpt("  short  "), "short");
    }
}
