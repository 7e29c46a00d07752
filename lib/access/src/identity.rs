//! Signed-in principals and the credentials used to obtain them.
//!
//! An `Identity` is issued by the session provider. The access controller
//! only observes it; nothing in this crate creates or mutates one on the
//! provider's behalf.

use gymdesk_core::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Principal id issued by the auth service.
    id: UserId,
    /// Email the principal signed in with, if the provider reports one.
    email: Option<String>,
}

impl Identity {
    /// Creates an identity with no email.
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self { id, email: None }
    }

    /// Creates an identity with an email address.
    #[must_use]
    pub fn with_email(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: Some(email.into()),
        }
    }

    /// Returns the principal id.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the principal's email, if known.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{email} ({})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Email and password for signing in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    email: String,
    password: String,
}

impl Credential {
    /// Creates a credential.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Returns the email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A new principal to register with the auth service.
pub type Registration = Credential;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_accessors() {
        let identity = Identity::with_email(UserId::from("u-1"), "ana@gym.test");
        assert_eq!(identity.id().as_str(), "u-1");
        assert_eq!(identity.email(), Some("ana@gym.test"));
        assert_eq!(identity.to_string(), "ana@gym.test (u-1)");
    }

    #[test]
    fn credential_debug_hides_password() {
        let credential = Credential::new("ana@gym.test", "hunter2");
        let debug = format!("{credential:?}");
        assert!(debug.contains("ana@gym.test"));
        assert!(!debug.contains("hunter2"));
    }
}
