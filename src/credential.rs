//! Control-port password handling
//!
//! The password is read once from the environment at startup and kept for the
//! life of the process. The buffer is wiped on drop and never printed.

use crate::error::ConfigError;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Environment variable holding the control-port password.
pub const DEFAULT_CREDENTIAL_ENV: &str = "VANGUARD";

/// Opaque control-port password.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    secret: String,
}

impl Credential {
    /// Wrap a password. Empty passwords are rejected.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return None;
        }
        Some(Self { secret })
    }

    /// Read the password from `var`. Unset, empty or non-UTF-8 values are a
    /// configuration error.
    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        std::env::var(var)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ConfigError::MissingCredential {
                var: var.to_string(),
            })
    }

    pub fn expose(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secret_rejected() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("hunter2").is_some());
    }

    #[test]
    fn test_from_env_unset() {
        let var = "TORFLUX_TEST_CREDENTIAL_UNSET";
        std::env::remove_var(var);

        let err = Credential::from_env(var).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { ref var } if var == "TORFLUX_TEST_CREDENTIAL_UNSET"));
        assert!(err.to_string().contains(var));
    }

    #[test]
    fn test_from_env_empty() {
        let var = "TORFLUX_TEST_CREDENTIAL_EMPTY";
        std::env::set_var(var, "");

        assert!(Credential::from_env(var).is_err());
    }

    #[test]
    fn test_from_env_set() {
        let var = "TORFLUX_TEST_CREDENTIAL_SET";
        std::env::set_var(var, "hunter2");

        let credential = Credential::from_env(var).unwrap();
        assert_eq!(credential.expose(), "hunter2");
    }

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("hunter2").unwrap();
        let shown = format!("{credential:?}");
        assert!(!shown.contains("hunter2"));
    }
}
