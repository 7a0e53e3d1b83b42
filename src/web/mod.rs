//! Web framework integration surface.
//!
//! This module maps the login service endpoints onto framework-agnostic
//! request and response values:
//! - [`CasRequest`]: request id, query/form parameters, session cookie
//! - [`CasFlows`]: login page, login submission, logout, ticket validation,
//!   proxy ticket requests
//! - [`LoginOutcome`] and [`ValidationResponse`]: what the transport renders
//!
//! # Design Principles
//!
//! 1. **No Framework Dependencies**: no HTTP server or client lives here.
//!    Framework code builds a `CasRequest` (see [`ExtractCasRequest`]) and
//!    turns the outcome into its own response type.
//!
//! 2. **Untrusted Inputs**: every parameter and the cookie are treated as
//!    attacker-controlled. Ticket values only reach the engine, which checks
//!    their shape before touching the store.
//!
//! 3. **Explicit Context**: no global state. The engine and the credential
//!    verifier are injected into [`CasFlows`].
//!
//! # Example Flow
//!
//! ```ignore
//! // In a framework-specific handler (e.g., axum, actix):
//! let request = http_req.extract_cas_request();
//! match flows.login_page(&request) {
//!     LoginOutcome::Render(page) => render_login_form(page),
//!     LoginOutcome::Redirect(redirect) => redirect_to(redirect),
//! }
//!
//! let response = flows.service_validate(&request);
//! reply(response.status, response.to_json()?);
//! ```

mod adapter;
mod extract;
mod flows;
mod response;

pub use adapter::{CasRequest, TGT_COOKIE};
pub use extract::ExtractCasRequest;
pub use flows::{CasFlows, DEFAULT_LOGIN_PATH};
pub use response::{
    AuthenticationSuccess, CookieAction, Failure, LoginOutcome, LoginPage, Redirect,
    ServiceResponse, ValidationResponse,
};
