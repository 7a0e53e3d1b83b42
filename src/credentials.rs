//! Credential verification boundary.
//!
//! The engine never checks passwords itself. A [`CredentialVerifier`] turns a
//! username and password into a [`Principal`] or refuses.

use std::collections::HashMap;

use subtle::ConstantTimeEq;

use crate::secret::Secret;
use crate::ticket::Attributes;

/// An authenticated user as reported by the user directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    /// Username tickets are issued for
    pub username: String,
    /// Attributes attached to the session and released on validation
    pub attributes: Attributes,
}

impl Principal {
    /// Creates a principal with no attributes.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            attributes: Attributes::new(),
        }
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Why a credential check failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticationError {
    /// Unknown user or wrong password. Deliberately not distinguished.
    #[error("incorrect username or password")]
    InvalidCredentials,

    /// The directory could not be consulted.
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

/// Checks a username/password pair against a user directory.
pub trait CredentialVerifier: Send + Sync {
    /// Returns the authenticated principal or an error.
    fn check_credentials(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<Principal, AuthenticationError>;
}

struct DirectoryEntry {
    password: Secret<String>,
    attributes: Attributes,
}

/// A fixed in-memory user directory.
///
/// # Example
///
/// ```
/// use cas_core::{CredentialVerifier, Secret, StaticCredentials};
///
/// let directory = StaticCredentials::new().with_user("alice", "wonderland");
///
/// let principal = directory
///     .check_credentials("alice", &Secret::from("wonderland"))
///     .unwrap();
/// assert_eq!(principal.username, "alice");
///
/// assert!(directory
///     .check_credentials("alice", &Secret::from("guess"))
///     .is_err());
/// ```
#[derive(Default)]
pub struct StaticCredentials {
    users: HashMap<String, DirectoryEntry>,
}

impl StaticCredentials {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user with no attributes.
    pub fn with_user(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.with_user_attributes(username, password, Attributes::new())
    }

    /// Adds a user with attributes.
    pub fn with_user_attributes(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        self.users.insert(
            username.into(),
            DirectoryEntry {
                password: Secret::new(password.into()),
                attributes,
            },
        );
        self
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("users", &self.users.len())
            .finish()
    }
}

impl CredentialVerifier for StaticCredentials {
    fn check_credentials(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<Principal, AuthenticationError> {
        let entry = self
            .users
            .get(username)
            .ok_or(AuthenticationError::InvalidCredentials)?;

        let matches: bool = entry
            .password
            .expose_secret()
            .as_bytes()
            .ct_eq(password.expose_secret().as_bytes())
            .into();
        if !matches {
            return Err(AuthenticationError::InvalidCredentials);
        }

        Ok(Principal {
            username: username.to_string(),
            attributes: entry.attributes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_correct_password() {
        let mut attrs = Attributes::new();
        attrs.insert("email".to_string(), json!("alice@example.com"));
        let directory = StaticCredentials::new().with_user_attributes("alice", "pw", attrs);

        let principal = directory
            .check_credentials("alice", &Secret::from("pw"))
            .unwrap();
        assert_eq!(principal.username, "alice");
        assert_eq!(principal.attributes["email"], json!("alice@example.com"));
    }

    #[test]
    fn unknown_user_and_wrong_password_look_the_same() {
        let directory = StaticCredentials::new().with_user("alice", "pw");

        let wrong = directory.check_credentials("alice", &Secret::from("nope"));
        let unknown = directory.check_credentials("mallory", &Secret::from("pw"));
        assert_eq!(wrong, Err(AuthenticationError::InvalidCredentials));
        assert_eq!(unknown, Err(AuthenticationError::InvalidCredentials));
    }

    #[test]
    fn debug_does_not_leak_passwords() {
        let directory = StaticCredentials::new().with_user("alice", "hunter2");
        let out = format!("{:?}", directory);
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn principal_builder() {
        let p = Principal::new("bob").with_attribute("role", json!("admin"));
        assert_eq!(p.username, "bob");
        assert_eq!(p.attributes.len(), 1);
    }
}
