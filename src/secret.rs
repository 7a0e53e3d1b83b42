use std::fmt;

/// A value that must never reach a log line or an error message.
///
/// Passwords submitted to the login form and proxy-granting ticket values
/// handed to the callback channel travel wrapped in `Secret`. The only way
/// to read the value is [`expose_secret`](Self::expose_secret).
///
/// # Examples
///
/// ```
/// use cas_core::Secret;
///
/// let password = Secret::new("correct horse".to_string());
///
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.to_string(), "[REDACTED]");
/// assert_eq!(password.expose_secret(), "correct horse");
/// ```
// Do not derive Clone or Default: copies of secrets should be deliberate.
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Returns the wrapped value.
    ///
    /// Callers must not log or display the result.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_redacted_in_debug() {
        let password = Secret::new("hunter2".to_string());
        let out = format!("{:?}", password);

        assert_eq!(out, "[REDACTED]");
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("String"));
    }

    #[test]
    fn password_is_redacted_in_display() {
        let pgt = Secret::new("PGT-0123456789");
        assert_eq!(pgt.to_string(), "[REDACTED]");
    }

    #[test]
    fn redacted_inside_structs() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Form {
            username: String,
            password: Secret<String>,
        }

        let form = Form {
            username: "alice".to_string(),
            password: Secret::from("hunter2"),
        };
        let out = format!("{:?}", form);
        assert!(out.contains("alice"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn explicit_access() {
        let secret: Secret<String> = String::from("s3cret").into();
        assert_eq!(secret.expose_secret(), "s3cret");
    }
}
