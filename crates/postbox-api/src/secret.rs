//! Shared-secret store for scheduler authentication.
//!
//! The secret is read once from configuration at startup and is
//! immutable for the lifetime of the process. Absence is a valid,
//! degraded state: authentication can then never succeed, which is
//! logged once here rather than on every request.

use tracing::warn;

/// Process-wide expected secret for scheduler requests.
#[derive(Debug, Clone)]
pub struct SharedSecret {
    value: Option<String>,
}

impl SharedSecret {
    /// Captures the configured secret, warning once when it is absent.
    pub fn from_config(value: Option<String>) -> Self {
        if value.is_none() {
            warn!("scheduler secret not configured, scheduler authentication is disabled");
        }
        Self { value }
    }

    /// Returns true when a secret was configured.
    pub fn is_configured(&self) -> bool {
        self.value.is_some()
    }

    /// Compares a candidate against the stored secret.
    ///
    /// Always false when no secret is configured. The comparison is
    /// plain value equality, not constant-time.
    pub fn matches(&self, candidate: &str) -> bool {
        self.value.as_deref() == Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_secret_matches_exact_value_only() {
        let secret = SharedSecret::from_config(Some("topsecret".to_string()));

        assert!(secret.is_configured());
        assert!(secret.matches("topsecret"));
        assert!(!secret.matches("topsecret "));
        assert!(!secret.matches("Topsecret"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn absent_secret_never_matches() {
        let secret = SharedSecret::from_config(None);

        assert!(!secret.is_configured());
        assert!(!secret.matches("anything"));
        assert!(!secret.matches(""));
    }
}
