//! The login service endpoints, expressed over [`CasRequest`].

use std::sync::Arc;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome};
use crate::credentials::{AuthenticationError, CredentialVerifier};
use crate::engine::{CasEngine, ValidationRequest, ValidationSuccess};
use crate::error::{ErrorCode, TicketError, INTERNAL_DESCRIPTION};
use crate::logging::RequestLog;
use crate::secret::Secret;
use crate::service_url::service_url_with_ticket;
use crate::ticket::Ticket;

use super::{CasRequest, CookieAction, LoginOutcome, LoginPage, Redirect, ValidationResponse};

const LOGGED_IN_AS: &str = "You are currently logged in as '{user}'. If this is not you, please log in below.";
const REDIRECTION_LOOP: &str =
    "The client and server are unable to negotiate authentication. Please try logging in again later.";
const GATEWAY_WITHOUT_SERVICE: &str =
    "The server cannot fulfill this gateway request because no service parameter was given.";
const LOGGED_IN: &str = "You have successfully logged in.";
const LOGGED_OUT: &str = "You have successfully logged out.";
const INCORRECT_CREDENTIALS: &str = "Incorrect username or password.";

/// Default path of the login page, used by the logout redirect.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Login, logout, and validation endpoints.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cas_core::web::{CasFlows, CasRequest, LoginOutcome};
/// use cas_core::{CasEngine, MemoryTicketStore, StaticCredentials};
///
/// let engine = Arc::new(
///     CasEngine::builder(Arc::new(MemoryTicketStore::open())).build().unwrap(),
/// );
/// let flows = CasFlows::new(
///     engine,
///     Arc::new(StaticCredentials::new().with_user("alice", "wonderland")),
/// );
///
/// let LoginOutcome::Render(page) = flows.login_page(&CasRequest::new("req-1".to_string()))
/// else {
///     panic!("no service, no session: the form is rendered");
/// };
/// let lt = page.login_ticket.unwrap();
///
/// let submit = CasRequest::new("req-2".to_string())
///     .with_param("lt", &lt)
///     .with_param("username", "alice")
///     .with_param("password", "wonderland")
///     .with_param("service", "https://app.example/");
/// let LoginOutcome::Redirect(redirect) = flows.submit_login(&submit) else {
///     panic!("a service was given: the browser is redirected");
/// };
/// assert_eq!(redirect.status, 303);
/// assert!(redirect.location.starts_with("https://app.example/?ticket=ST-"));
/// ```
pub struct CasFlows {
    engine: Arc<CasEngine>,
    verifier: Arc<dyn CredentialVerifier>,
    login_path: String,
}

impl std::fmt::Debug for CasFlows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasFlows")
            .field("engine", &self.engine)
            .field("login_path", &self.login_path)
            .finish()
    }
}

impl CasFlows {
    /// Creates the flows over an engine and a credential verifier.
    pub fn new(engine: Arc<CasEngine>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            engine,
            verifier,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }

    /// Sets the login page path the logout flow redirects to.
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<CasEngine> {
        &self.engine
    }

    /// Login page render (GET).
    ///
    /// With a live session and a service (and no `renew`), redirects straight
    /// to the service with a new ticket. In gateway mode without a session,
    /// redirects to the service without one. Otherwise renders the form with
    /// a fresh login ticket.
    pub fn login_page(&self, request: &CasRequest) -> LoginOutcome {
        let log = RequestLog::new(request.request_id());
        let service = request.param("service");
        let renew = request.flag("renew");
        let gateway = request.flag("gateway");
        let session = request
            .tgt_cookie()
            .and_then(|value| self.engine.validate_tgt(value).ok());

        let mut page = LoginPage::new(service);
        if let Some(tgt) = &session {
            page.notice = Some(LOGGED_IN_AS.replace("{user}", tgt.owner()));
        }
        if request.flag("redirection_loop_intercepted") {
            page.error = Some(REDIRECTION_LOOP.to_string());
        }

        match (service, &session) {
            (Some(service), Some(tgt)) if !renew => {
                match self.redirect_with_ticket(tgt, service, false, 302) {
                    Ok(redirect) => {
                        log.info(format_args!("single sign-on for '{}'", tgt.owner()));
                        return LoginOutcome::Redirect(redirect);
                    }
                    Err(err) => {
                        log.warn(format_args!("single sign-on failed: {err}"));
                        page.fail(&err);
                    }
                }
            }
            (Some(service), _) if gateway && !renew => {
                log.debug(format_args!("gateway request without session"));
                return LoginOutcome::Redirect(Redirect {
                    location: service.to_string(),
                    status: 302,
                    notice: None,
                    continue_url: None,
                    cookie: CookieAction::Keep,
                });
            }
            (None, _) if gateway => {
                page.error = Some(GATEWAY_WITHOUT_SERVICE.to_string());
            }
            _ => {}
        }

        self.render(page, &log)
    }

    /// Login form submission (POST).
    ///
    /// A fresh login ticket is prepared for the next form render whatever
    /// the outcome.
    pub fn submit_login(&self, request: &CasRequest) -> LoginOutcome {
        let log = RequestLog::new(request.request_id());
        let service = request.param("service");
        let mut page = LoginPage::new(service);

        let lt = request.param("lt").unwrap_or_default();
        if let Err(err) = self.engine.validate_login_ticket(lt) {
            log.warn(format_args!("login ticket rejected: {err}"));
            page.fail(&err);
            return self.render(page, &log);
        }

        let username = request.param("username").unwrap_or_default();
        let password = Secret::new(request.param("password").unwrap_or_default().to_string());
        let principal = match self.verifier.check_credentials(username, &password) {
            Ok(principal) => principal,
            Err(AuthenticationError::InvalidCredentials) => {
                self.engine.auditor().emit(
                    AuditEvent::new(AuditEventKind::AuthenticationFailed, AuditOutcome::Denied)
                        .with_principal(username)
                        .with_request_id(request.request_id()),
                );
                page.status = 401;
                page.error = Some(INCORRECT_CREDENTIALS.to_string());
                return self.render(page, &log);
            }
            Err(err @ AuthenticationError::Unavailable(_)) => {
                log.error(format_args!("credential check failed: {err}"));
                page.status = ErrorCode::InternalError.status().http_status();
                page.error = Some(INTERNAL_DESCRIPTION.to_string());
                return self.render(page, &log);
            }
        };

        let tgt = match self
            .engine
            .create_tgt(&principal.username, principal.attributes)
        {
            Ok(tgt) => tgt,
            Err(err) => {
                page.fail(&err);
                return self.render(page, &log);
            }
        };
        log.info(format_args!("'{}' logged in", tgt.owner()));
        let cookie = CookieAction::Set(tgt.id().as_str().to_string());

        if let Some(service) = service {
            match self.redirect_with_ticket(&tgt, service, true, 303) {
                Ok(redirect) => {
                    return LoginOutcome::Redirect(Redirect { cookie, ..redirect });
                }
                Err(err) => {
                    log.warn(format_args!("service ticket not issued: {err}"));
                    page.fail(&err);
                }
            }
        } else {
            page.notice = Some(LOGGED_IN.to_string());
        }
        page.cookie = cookie;
        self.render(page, &log)
    }

    /// Logout.
    ///
    /// Destroys the session and everything chained beneath it, then clears
    /// the cookie. In gateway mode with a service, redirects to the service;
    /// otherwise back to the login page. A `url` parameter is passed along
    /// as [`Redirect::continue_url`] for the logged-out notice.
    pub fn logout(&self, request: &CasRequest) -> LoginOutcome {
        let log = RequestLog::new(request.request_id());
        let service = request
            .param("service")
            .or_else(|| request.param("destination"))
            .and_then(|s| self.engine.services().normalize(s).ok());

        if let Some(value) = request.tgt_cookie() {
            match self.engine.destroy_tgt(value) {
                Ok(report) if report.tgt_destroyed => log.info(format_args!(
                    "logged out, {} proxy-granting tickets destroyed",
                    report.pgts_destroyed
                )),
                Ok(_) => log.debug(format_args!("logout without a live session")),
                Err(err) => log.error(format_args!("logout failed: {err}")),
            }
        }

        let location = match (&service, request.flag("gateway")) {
            (Some(service), true) => service.clone(),
            (Some(service), false) => {
                let encoded: String = url::form_urlencoded::byte_serialize(service.as_bytes()).collect();
                format!("{}?service={encoded}", self.login_path)
            }
            (None, _) => self.login_path.clone(),
        };
        LoginOutcome::Redirect(Redirect {
            location,
            status: 303,
            notice: Some(LOGGED_OUT.to_string()),
            continue_url: request.param("url").map(str::to_string),
            cookie: CookieAction::Clear,
        })
    }

    /// Service ticket validation.
    pub fn service_validate(&self, request: &CasRequest) -> ValidationResponse {
        let log = RequestLog::new(request.request_id());
        let result = validation_request(request)
            .and_then(|req| self.engine.validate_service_ticket(&req));
        respond(result, &log)
    }

    /// Proxy ticket validation. Service tickets are accepted too.
    pub fn proxy_validate(&self, request: &CasRequest) -> ValidationResponse {
        let log = RequestLog::new(request.request_id());
        let result = validation_request(request)
            .and_then(|req| self.engine.validate_proxy_ticket(&req));
        respond(result, &log)
    }

    /// Proxy ticket request: mints a proxy ticket for `targetService` from
    /// the proxy-granting ticket `pgt`.
    pub fn proxy(&self, request: &CasRequest) -> ValidationResponse {
        let log = RequestLog::new(request.request_id());
        let result = match (request.param("pgt"), request.param("targetService")) {
            (None, _) => Err(TicketError::MissingParameter("pgt")),
            (_, None) => Err(TicketError::MissingParameter("targetService")),
            (Some(pgt), Some(target)) => self.engine.issue_proxy_ticket(pgt, target),
        };
        match result {
            Ok(pt) => ValidationResponse::proxy_success(pt.id().as_str()),
            Err(err) => {
                log_failure(&err, &log);
                ValidationResponse::proxy_failure(&err)
            }
        }
    }

    fn redirect_with_ticket(
        &self,
        tgt: &Ticket,
        service: &str,
        from_new_login: bool,
        status: u16,
    ) -> Result<Redirect, TicketError> {
        let st = self
            .engine
            .issue_service_ticket(tgt.id().as_str(), service, from_new_login)?;
        let location = service_url_with_ticket(st.service().unwrap_or(service), st.id().as_str())?;
        Ok(Redirect {
            location,
            status,
            notice: None,
            continue_url: None,
            cookie: CookieAction::Keep,
        })
    }

    fn render(&self, mut page: LoginPage, log: &RequestLog<'_>) -> LoginOutcome {
        match self.engine.issue_login_ticket() {
            Ok(lt) => page.login_ticket = Some(lt.id().as_str().to_string()),
            Err(err) => {
                log.error(format_args!("login ticket not issued: {err}"));
                page.fail(&err);
            }
        }
        LoginOutcome::Render(page)
    }
}

fn validation_request(request: &CasRequest) -> Result<ValidationRequest, TicketError> {
    let service = request
        .param("service")
        .ok_or(TicketError::MissingParameter("service"))?;
    let ticket = request
        .param("ticket")
        .ok_or(TicketError::MissingParameter("ticket"))?;
    let mut req = ValidationRequest::new(service, ticket).with_renew(request.flag("renew"));
    if let Some(pgt_url) = request.param("pgtUrl") {
        req = req.with_pgt_url(pgt_url);
    }
    Ok(req)
}

fn respond(
    result: Result<ValidationSuccess, TicketError>,
    log: &RequestLog<'_>,
) -> ValidationResponse {
    match result {
        Ok(success) => {
            log.debug(format_args!("validated ticket for '{}'", success.user));
            ValidationResponse::success(success)
        }
        Err(err) => {
            log_failure(&err, log);
            ValidationResponse::failure(&err)
        }
    }
}

fn log_failure(err: &TicketError, log: &RequestLog<'_>) {
    match err.code() {
        ErrorCode::InternalError => log.error(format_args!("{} ({err})", err.code())),
        _ => log.info(format_args!("{} ({err})", err.code())),
    }
}
