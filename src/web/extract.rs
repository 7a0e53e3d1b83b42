//! Extraction boundary trait for web integration.

use super::CasRequest;

/// Builds a [`CasRequest`] from a framework-specific request.
///
/// Implementations only map framework types onto owned data: they read the
/// request id, the query and form parameters, and the session cookie. They
/// never validate tickets or check credentials; the flows do that.
///
/// # Examples
///
/// ```
/// use cas_core::web::{CasRequest, ExtractCasRequest};
///
/// struct MyFrameworkRequest {
///     id: String,
///     query: Vec<(String, String)>,
///     cookie: Option<String>,
/// }
///
/// impl ExtractCasRequest for MyFrameworkRequest {
///     fn extract_cas_request(&self) -> CasRequest {
///         let mut request = CasRequest::new(self.id.clone());
///         for (k, v) in &self.query {
///             request.add_param(k.clone(), v.clone());
///         }
///         request.set_tgt_cookie(self.cookie.clone());
///         request
///     }
/// }
///
/// let framework_request = MyFrameworkRequest {
///     id: "req-7".to_string(),
///     query: vec![("service".to_string(), "https://app.example/".to_string())],
///     cookie: None,
/// };
/// let request = framework_request.extract_cas_request();
/// assert_eq!(request.param("service"), Some("https://app.example/"));
/// ```
pub trait ExtractCasRequest {
    /// Maps the framework request onto a [`CasRequest`].
    fn extract_cas_request(&self) -> CasRequest;
}

impl ExtractCasRequest for CasRequest {
    fn extract_cas_request(&self) -> CasRequest {
        self.clone()
    }
}
