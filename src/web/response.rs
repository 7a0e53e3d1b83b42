//! Outcomes of the login flows and protocol responses.

use serde::Serialize;

use crate::engine::ValidationSuccess;
use crate::error::TicketError;
use crate::ticket::Attributes;

/// What the transport should do with the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CookieAction {
    /// Leave the cookie as it is
    #[default]
    Keep,
    /// Set the cookie to this session value
    Set(String),
    /// Delete the cookie
    Clear,
}

/// A login page to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPage {
    /// HTTP status
    pub status: u16,
    /// Informational message
    pub notice: Option<String>,
    /// Error message
    pub error: Option<String>,
    /// Login ticket to embed in the form. `None` only if issuing one failed.
    pub login_ticket: Option<String>,
    /// Service to carry through the form
    pub service: Option<String>,
    /// Session cookie instruction
    pub cookie: CookieAction,
}

impl LoginPage {
    pub(crate) fn new(service: Option<&str>) -> Self {
        Self {
            status: 200,
            notice: None,
            error: None,
            login_ticket: None,
            service: service.map(str::to_string),
            cookie: CookieAction::Keep,
        }
    }

    pub(crate) fn fail(&mut self, err: &TicketError) {
        self.status = err.status().http_status();
        self.error = Some(err.description());
    }
}

/// A redirect to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Target URL
    pub location: String,
    /// HTTP status (302 or 303)
    pub status: u16,
    /// Message to show on the next page
    pub notice: Option<String>,
    /// Link offered alongside the notice (the `url` parameter of a logout)
    pub continue_url: Option<String>,
    /// Session cookie instruction
    pub cookie: CookieAction,
}

/// Result of a login page flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Render the login page
    Render(LoginPage),
    /// Redirect the browser
    Redirect(Redirect),
}

impl LoginOutcome {
    /// Returns the HTTP status of the outcome.
    pub fn status(&self) -> u16 {
        match self {
            LoginOutcome::Render(page) => page.status,
            LoginOutcome::Redirect(redirect) => redirect.status,
        }
    }

    /// Returns the session cookie instruction.
    pub fn cookie(&self) -> &CookieAction {
        match self {
            LoginOutcome::Render(page) => &page.cookie,
            LoginOutcome::Redirect(redirect) => &redirect.cookie,
        }
    }
}

/// Body of a protocol response, serialized under `serviceResponse`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ServiceResponse {
    /// Ticket validated
    #[serde(rename = "authenticationSuccess")]
    AuthenticationSuccess(AuthenticationSuccess),
    /// Ticket rejected
    #[serde(rename = "authenticationFailure")]
    AuthenticationFailure(Failure),
    /// Proxy ticket issued
    #[serde(rename = "proxySuccess")]
    ProxySuccess {
        /// The new proxy ticket
        #[serde(rename = "proxyTicket")]
        proxy_ticket: String,
    },
    /// Proxy ticket refused
    #[serde(rename = "proxyFailure")]
    ProxyFailure(Failure),
}

/// Successful validation body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticationSuccess {
    /// Principal the ticket was issued for
    pub user: String,
    /// IOU of a newly issued proxy-granting ticket
    #[serde(rename = "proxyGrantingTicket", skip_serializing_if = "Option::is_none")]
    pub proxy_granting_ticket: Option<String>,
    /// Proxy chain, most recent proxy first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<String>,
    /// Session attributes
    pub attributes: Attributes,
}

impl From<ValidationSuccess> for AuthenticationSuccess {
    fn from(success: ValidationSuccess) -> Self {
        Self {
            user: success.user,
            proxy_granting_ticket: success.pgt_iou,
            proxies: success.proxies,
            attributes: success.attributes,
        }
    }
}

/// Failure body: protocol code and a caller-safe description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Protocol error code
    pub code: String,
    /// Human-readable description
    pub description: String,
}

impl From<&TicketError> for Failure {
    fn from(err: &TicketError) -> Self {
        Self {
            code: err.code().as_str().to_string(),
            description: err.description(),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "serviceResponse")]
    service_response: &'a ServiceResponse,
}

/// Response of a validation or proxy endpoint.
///
/// # Examples
///
/// ```
/// use cas_core::web::ValidationResponse;
/// use cas_core::TicketError;
///
/// let response = ValidationResponse::failure(&TicketError::MissingParameter("ticket"));
/// assert_eq!(response.status, 422);
///
/// let json = response.to_json().unwrap();
/// assert!(json.contains(r#""code":"INVALID_REQUEST""#));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResponse {
    /// HTTP status
    pub status: u16,
    /// Response body
    pub body: ServiceResponse,
}

impl ValidationResponse {
    /// A successful validation.
    pub fn success(success: ValidationSuccess) -> Self {
        Self {
            status: 200,
            body: ServiceResponse::AuthenticationSuccess(success.into()),
        }
    }

    /// A failed validation, with the status mapped from the error code.
    pub fn failure(err: &TicketError) -> Self {
        Self {
            status: err.status().http_status(),
            body: ServiceResponse::AuthenticationFailure(err.into()),
        }
    }

    /// An issued proxy ticket.
    pub fn proxy_success(proxy_ticket: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: ServiceResponse::ProxySuccess {
                proxy_ticket: proxy_ticket.into(),
            },
        }
    }

    /// A refused proxy ticket request.
    pub fn proxy_failure(err: &TicketError) -> Self {
        Self {
            status: err.status().http_status(),
            body: ServiceResponse::ProxyFailure(err.into()),
        }
    }

    /// Returns true for a success body.
    pub fn is_success(&self) -> bool {
        matches!(
            self.body,
            ServiceResponse::AuthenticationSuccess(_) | ServiceResponse::ProxySuccess { .. }
        )
    }

    /// Serializes the body as `{"serviceResponse": ...}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Envelope {
            service_response: &self.body,
        })
    }
}
