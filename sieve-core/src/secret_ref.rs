//! Secret reference types for credential resolution.
//!
//! Credentials in the configuration file are stored as references rather than
//! values where possible:
//! - `"env:<VAR>"` (or legacy `"ENV:<VAR>"`) resolves from an environment variable
//! - any other non-empty string is inline plaintext (accepted with a warning)

use serde::{Deserialize, Serialize};

/// A reference to a secret value that is resolved at startup.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(String);

impl SecretRef {
    /// Create an environment variable-backed secret reference.
    pub fn env(var_name: &str) -> Self {
        Self(format!("env:{var_name}"))
    }

    /// Create an inline (plaintext) secret reference.
    pub fn inline(value: &str) -> Self {
        Self(value.to_string())
    }

    /// Check if this reference is empty (no secret configured).
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The environment variable name, if this is an env reference.
    pub fn env_var(&self) -> Option<&str> {
        self.0
            .strip_prefix("env:")
            .or_else(|| self.0.strip_prefix("ENV:"))
    }

    /// Check if this is an inline (plaintext) value.
    pub fn is_inline(&self) -> bool {
        !self.is_empty() && self.env_var().is_none()
    }

    /// A display form that never reveals inline secrets.
    pub fn redacted(&self) -> String {
        match self.env_var() {
            Some(var) => format!("env:{var}"),
            None if self.is_empty() => String::new(),
            None => "********".to_string(),
        }
    }
}

impl std::fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretRef({})", self.redacted())
    }
}

impl std::fmt::Display for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl From<String> for SecretRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Resolves `SecretRef` values to actual secret strings.
pub struct SecretResolver;

impl SecretResolver {
    /// Resolve a `SecretRef` to its value.
    ///
    /// `field` names the configuration key and is used only in errors and logs.
    pub fn resolve(field: &str, secret_ref: &SecretRef) -> Result<String, SecretResolveError> {
        if secret_ref.is_empty() {
            return Err(SecretResolveError::Empty {
                field: field.to_string(),
            });
        }

        if let Some(var) = secret_ref.env_var() {
            match std::env::var(var) {
                Ok(value) if !value.is_empty() => Ok(value),
                _ => Err(SecretResolveError::EnvVarMissing {
                    field: field.to_string(),
                    var: var.to_string(),
                }),
            }
        } else {
            tracing::warn!(
                field,
                "Inline plaintext credential in configuration; prefer an env:VAR reference"
            );
            Ok(secret_ref.0.clone())
        }
    }
}

/// Errors from secret resolution.
#[derive(Debug, thiserror::Error)]
pub enum SecretResolveError {
    #[error("No credential configured for '{field}'")]
    Empty { field: String },

    #[error("Environment variable '{var}' for '{field}' is not set")]
    EnvVarMissing { field: String, var: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_reference_detection() {
        assert_eq!(SecretRef::env("JIRA_TOKEN").env_var(), Some("JIRA_TOKEN"));
        assert_eq!(SecretRef::from("ENV:SUMO_KEY").env_var(), Some("SUMO_KEY"));
        assert!(SecretRef::inline("hunter2").is_inline());
        assert!(!SecretRef::default().is_inline());
    }

    #[test]
    fn test_redaction_hides_inline_values() {
        let secret = SecretRef::inline("hunter2");
        assert_eq!(secret.to_string(), "********");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(SecretRef::env("X").to_string(), "env:X");
    }

    #[test]
    fn test_resolve_inline() {
        let value = SecretResolver::resolve("tracker.api_token", &"abc".into()).unwrap();
        assert_eq!(value, "abc");
    }

    #[test]
    fn test_resolve_env_present() {
        // PATH is set in every test environment.
        let value = SecretResolver::resolve("x", &SecretRef::env("PATH")).unwrap();
        assert!(!value.is_empty());
    }

    #[test]
    fn test_resolve_env_missing() {
        let err = SecretResolver::resolve(
            "source.password",
            &SecretRef::env("SIEVE_TEST_SURELY_UNSET_VARIABLE"),
        )
        .unwrap_err();
        assert!(matches!(err, SecretResolveError::EnvVarMissing { .. }));
        assert!(err.to_string().contains("source.password"));
    }

    #[test]
    fn test_resolve_empty() {
        let err = SecretResolver::resolve("tracker.api_token", &SecretRef::default()).unwrap_err();
        assert!(matches!(err, SecretResolveError::Empty { .. }));
    }
}
