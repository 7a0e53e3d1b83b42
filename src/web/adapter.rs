//! Request adapter for mapping HTTP requests onto the login flows.

use std::collections::HashMap;

/// Name of the cookie that carries the session value.
pub const TGT_COOKIE: &str = "tgt";

/// Framework-agnostic view of an incoming login or validation request.
///
/// Holds only owned data so it never couples to a framework's request type.
/// Framework integrations implement [`ExtractCasRequest`] for their own
/// request type, or fill a `CasRequest` by hand.
///
/// Query and form parameters share one namespace, mirroring how the login
/// endpoints read them. A parameter present with an empty value is treated
/// as absent.
///
/// # Examples
///
/// ```
/// use cas_core::web::CasRequest;
///
/// let mut request = CasRequest::new("req-12345".to_string());
/// request.add_param("service".to_string(), "https://app.example/".to_string());
/// request.add_param("renew".to_string(), "true".to_string());
/// request.set_tgt_cookie(Some("TGT-abc".to_string()));
///
/// assert_eq!(request.param("service"), Some("https://app.example/"));
/// assert!(request.flag("renew"));
/// assert!(!request.flag("gateway"));
/// assert_eq!(request.tgt_cookie(), Some("TGT-abc"));
/// ```
///
/// [`ExtractCasRequest`]: super::ExtractCasRequest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasRequest {
    /// Unique request identifier, attached to every log line
    request_id: String,
    /// Query and form parameters (untrusted)
    params: HashMap<String, String>,
    /// Session cookie value (untrusted)
    tgt_cookie: Option<String>,
}

impl CasRequest {
    /// Creates an empty request with the given request id.
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            params: HashMap::new(),
            tgt_cookie: None,
        }
    }

    /// Adds a query or form parameter. A later value replaces an earlier one.
    pub fn add_param(&mut self, key: String, value: String) {
        self.params.insert(key, value);
    }

    /// Builder form of [`add_param`](Self::add_param).
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.add_param(key.to_string(), value.to_string());
        self
    }

    /// Sets the session cookie value.
    pub fn set_tgt_cookie(&mut self, value: Option<String>) {
        self.tgt_cookie = value.filter(|v| !v.is_empty());
    }

    /// Builder form of [`set_tgt_cookie`](Self::set_tgt_cookie).
    pub fn with_tgt_cookie(mut self, value: &str) -> Self {
        self.set_tgt_cookie(Some(value.to_string()));
        self
    }

    /// Returns the request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns a non-empty parameter value.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Returns true if a boolean parameter is set.
    ///
    /// Any non-empty value other than `false` or `0` counts as set.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.param(key), Some(v) if v != "false" && v != "0")
    }

    /// Returns the session cookie value, if any.
    pub fn tgt_cookie(&self) -> Option<&str> {
        self.tgt_cookie.as_deref()
    }
}
