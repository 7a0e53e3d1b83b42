//! The validation engine: the public face of the ticket core.
//!
//! [`CasEngine`] wires one store, one clock, configuration, the service
//! matcher, the proxy callback channel and the auditor together and exposes
//! the operations a transport layer calls. Each call is synchronous and may
//! run concurrently with any other; all coordination happens in the store.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::audit::Auditor;
use crate::callback::ProxyCallback;
use crate::clock::{Clock, SystemClock};
use crate::config::{CasConfig, ConfigError};
use crate::context::TicketContext;
use crate::error::{ErrorCode, TicketError};
use crate::granting::TicketGrantingTickets;
use crate::login::LoginTickets;
use crate::proxy::{ProxyGrantingTickets, ProxyTickets};
use crate::service::ServiceTickets;
use crate::service_url::{ServiceMatcher, ServiceRegistry};
use crate::store::{CascadeReport, TicketStore};
use crate::ticket::{Attributes, Ticket, TicketBody};

/// Parameters of a service or proxy ticket validation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    /// Service URL the caller claims to be
    pub service: String,
    /// Ticket being validated
    pub ticket: String,
    /// Callback URL for a proxy-granting ticket, if the caller wants one
    pub pgt_url: Option<String>,
    /// Only accept tickets issued from a fresh credential check
    pub renew: bool,
}

impl ValidationRequest {
    /// Creates a plain validation request.
    pub fn new(service: impl Into<String>, ticket: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ticket: ticket.into(),
            pgt_url: None,
            renew: false,
        }
    }

    /// Asks for a proxy-granting ticket delivered to `pgt_url`.
    pub fn with_pgt_url(mut self, pgt_url: impl Into<String>) -> Self {
        self.pgt_url = Some(pgt_url.into());
        self
    }

    /// Sets the `renew` flag.
    pub fn with_renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }
}

/// Successful validation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSuccess {
    /// Principal the ticket was issued for
    pub user: String,
    /// Attributes of the session at the root of the chain
    pub attributes: Attributes,
    /// IOU of a newly issued proxy-granting ticket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pgt_iou: Option<String>,
    /// Proxies the ticket passed through, most recent first
    pub proxies: Vec<String>,
}

/// Central ticket engine.
///
/// `CasEngine` is `Send + Sync`; share it behind an `Arc` across request
/// handlers.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cas_core::{CasEngine, MemoryTicketStore, ValidationRequest};
///
/// let engine = CasEngine::builder(Arc::new(MemoryTicketStore::open()))
///     .build()
///     .unwrap();
///
/// let tgt = engine.create_tgt("alice", Default::default()).unwrap();
/// let st = engine
///     .issue_service_ticket(tgt.id().as_str(), "https://app.example/", true)
///     .unwrap();
///
/// let success = engine
///     .validate_service_ticket(&ValidationRequest::new("https://app.example/", st.id().as_str()))
///     .unwrap();
/// assert_eq!(success.user, "alice");
///
/// // Service tickets are single-use.
/// assert!(engine
///     .validate_service_ticket(&ValidationRequest::new("https://app.example/", st.id().as_str()))
///     .is_err());
/// ```
pub struct CasEngine {
    ctx: TicketContext,
}

impl fmt::Debug for CasEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CasEngine")
            .field("store_open", &self.ctx.store.is_open())
            .field("tickets", &self.ctx.tickets)
            .field("services", &self.ctx.services)
            .field("callback", &self.ctx.callback.is_some())
            .finish()
    }
}

impl CasEngine {
    /// Starts building an engine over `store`.
    pub fn builder(store: Arc<dyn TicketStore>) -> CasEngineBuilder {
        CasEngineBuilder::new(store)
    }

    /// Login ticket component.
    pub fn login_tickets(&self) -> LoginTickets<'_> {
        LoginTickets::new(&self.ctx)
    }

    /// Session component.
    pub fn granting_tickets(&self) -> TicketGrantingTickets<'_> {
        TicketGrantingTickets::new(&self.ctx)
    }

    /// Service ticket component.
    pub fn service_tickets(&self) -> ServiceTickets<'_> {
        ServiceTickets::new(&self.ctx)
    }

    /// Proxy-granting ticket component.
    pub fn proxy_granting_tickets(&self) -> ProxyGrantingTickets<'_> {
        ProxyGrantingTickets::new(&self.ctx)
    }

    /// Proxy ticket component.
    pub fn proxy_tickets(&self) -> ProxyTickets<'_> {
        ProxyTickets::new(&self.ctx)
    }

    /// Returns the auditor every component reports to.
    pub fn auditor(&self) -> &Auditor {
        &self.ctx.auditor
    }

    /// Returns the engine's clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.ctx.clock
    }

    /// Returns the service matcher.
    pub fn services(&self) -> &ServiceMatcher {
        &self.ctx.services
    }

    /// Issues a login ticket for a login form render.
    pub fn issue_login_ticket(&self) -> Result<Ticket, TicketError> {
        self.login_tickets().generate()
    }

    /// Consumes a login ticket submitted with a login form.
    pub fn validate_login_ticket(&self, value: &str) -> Result<Ticket, TicketError> {
        self.login_tickets().validate(value)
    }

    /// Opens a session.
    pub fn create_tgt(&self, owner: &str, extra_attributes: Attributes) -> Result<Ticket, TicketError> {
        self.granting_tickets().create(owner, extra_attributes)
    }

    /// Looks up a session by value.
    pub fn find_tgt(&self, value: &str) -> Result<Option<Ticket>, TicketError> {
        self.granting_tickets().find_by_value(value)
    }

    /// Returns the session if it can be reused for single sign-on.
    pub fn validate_tgt(&self, value: &str) -> Result<Ticket, TicketError> {
        self.granting_tickets().validate(value)
    }

    /// Destroys a session and everything chained beneath it.
    pub fn destroy_tgt(&self, value: &str) -> Result<CascadeReport, TicketError> {
        self.granting_tickets().destroy(value)
    }

    /// Issues a service ticket under a live session.
    ///
    /// # Errors
    ///
    /// `INVALID_TICKET` if the session is not live; `INVALID_REQUEST` if the
    /// service URL is unusable.
    pub fn issue_service_ticket(
        &self,
        tgt_value: &str,
        service: &str,
        from_new_login: bool,
    ) -> Result<Ticket, TicketError> {
        let tgt = self.validate_tgt(tgt_value)?;
        self.service_tickets().issue(&tgt, service, from_new_login)
    }

    /// Validates a service ticket.
    ///
    /// When the request carries a callback URL a proxy-granting ticket is
    /// issued and its IOU returned. A failure to issue or deliver it is
    /// logged and leaves the validation itself successful, without an IOU.
    pub fn validate_service_ticket(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationSuccess, TicketError> {
        let st = self
            .service_tickets()
            .validate(&request.service, &request.ticket, request.renew)?;
        self.success(st, Vec::new(), request.pgt_url.as_deref())
    }

    /// Mints a proxy ticket from a proxy-granting ticket.
    pub fn issue_proxy_ticket(&self, pgt_value: &str, target_service: &str) -> Result<Ticket, TicketError> {
        self.proxy_tickets().issue(pgt_value, target_service)
    }

    /// Validates a proxy ticket (or a service ticket) and reports its proxy
    /// chain, most recent proxy first.
    pub fn validate_proxy_ticket(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationSuccess, TicketError> {
        let validated = self
            .proxy_tickets()
            .validate(&request.service, &request.ticket, request.renew)?;
        self.success(
            validated.ticket,
            validated.proxies,
            request.pgt_url.as_deref(),
        )
    }

    /// Resolves a proxy-granting ticket to the session at the root of its
    /// chain.
    ///
    /// # Errors
    ///
    /// `BAD_PGT` if the PGT or any part of its chain up to the session is gone.
    pub fn resolve_pgt_owner_chain(&self, pgt_value: &str) -> Result<Ticket, TicketError> {
        let pgts = self.proxy_granting_tickets();
        let pgt = pgts.find(pgt_value)?;
        pgts.resolve_chain_owner(&pgt)
    }

    /// Removes every ticket expired now. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, TicketError> {
        let removed = self
            .ctx
            .store
            .purge_expired(self.ctx.now())
            .map_err(|e| self.ctx.store_fault("purge expired", e))?;
        if removed > 0 {
            tracing::debug!(removed, "purged expired tickets");
        }
        Ok(removed)
    }

    /// Closes the ticket store. Every later call fails with `INTERNAL_ERROR`.
    pub fn shutdown(&self) {
        tracing::info!("closing ticket store");
        self.ctx.store.close();
    }

    fn success(
        &self,
        ticket: Ticket,
        proxies: Vec<String>,
        pgt_url: Option<&str>,
    ) -> Result<ValidationSuccess, TicketError> {
        let attributes = self.root_attributes(&ticket)?;
        let pgt_iou = match pgt_url.filter(|u| !u.is_empty()) {
            Some(url) => self.grant_pgt(&ticket, url),
            None => None,
        };
        Ok(ValidationSuccess {
            user: ticket.owner().to_string(),
            attributes,
            pgt_iou,
            proxies,
        })
    }

    fn grant_pgt(&self, parent: &Ticket, pgt_url: &str) -> Option<String> {
        match self.proxy_granting_tickets().issue(parent, pgt_url) {
            Ok(pgt) => pgt.iou().map(|iou| iou.as_str().to_string()),
            Err(e) if e.code() == ErrorCode::InternalError => {
                tracing::error!(error = %e, "proxy-granting ticket not issued");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "proxy-granting ticket not issued");
                None
            }
        }
    }

    /// Attributes of the session at the root of the ticket's chain, or an
    /// empty map if the session is gone.
    fn root_attributes(&self, ticket: &Ticket) -> Result<Attributes, TicketError> {
        let Some(root) = ticket.root_tgt() else {
            return Ok(Attributes::new());
        };
        Ok(match self.ctx.find(root.as_str())?.map(|t| t.body().clone()) {
            Some(TicketBody::Granting { extra_attributes }) => extra_attributes,
            _ => Attributes::new(),
        })
    }
}

/// Builder for [`CasEngine`].
pub struct CasEngineBuilder {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    config: CasConfig,
    registry: Option<Arc<dyn ServiceRegistry>>,
    callback: Option<Arc<dyn ProxyCallback>>,
    auditor: Auditor,
}

impl CasEngineBuilder {
    fn new(store: Arc<dyn TicketStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: CasConfig::default(),
            registry: None,
            callback: None,
            auditor: Auditor::new(),
        }
    }

    /// Uses `clock` instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Uses `config` instead of the defaults.
    pub fn config(mut self, config: CasConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an external service registry instead of the configured rules.
    pub fn registry(mut self, registry: Arc<dyn ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Delivers proxy-granting tickets through `callback`. Without one, no
    /// proxy-granting ticket is ever issued.
    pub fn proxy_callback(mut self, callback: Arc<dyn ProxyCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Reports audit events through `auditor`.
    pub fn auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    /// Validates the configuration and builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or a
    /// registered service pattern does not compile.
    pub fn build(self) -> Result<CasEngine, ConfigError> {
        self.config.validate()?;
        let mut services = ServiceMatcher::from_config(&self.config.services)?;
        if let Some(registry) = self.registry {
            services = services.with_registry(registry);
        }
        Ok(CasEngine {
            ctx: TicketContext {
                store: self.store,
                clock: self.clock,
                tickets: self.config.tickets,
                services,
                require_https_callback: self.config.services.require_https_callback,
                callback: self.callback,
                auditor: self.auditor,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::RecordingCallback;
    use crate::clock::ManualClock;
    use crate::error::ErrorCode;
    use crate::store::MemoryTicketStore;
    use chrono::Duration;

    const SVC: &str = "https://svc1/cb";

    fn engine() -> (CasEngine, Arc<ManualClock>, Arc<RecordingCallback>) {
        let clock = Arc::new(ManualClock::starting_now());
        let callback = Arc::new(RecordingCallback::new());
        let engine = CasEngine::builder(Arc::new(MemoryTicketStore::open()))
            .clock(clock.clone())
            .proxy_callback(callback.clone())
            .build()
            .unwrap();
        (engine, clock, callback)
    }

    fn attrs() -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("role".to_string(), serde_json::json!("admin"));
        attrs
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CasEngine>();
    }

    #[test]
    fn oversized_lifetime_is_rejected_at_build() {
        let mut config = CasConfig::default();
        config.tickets.session_ttl_secs = i64::MAX;

        let err = CasEngine::builder(Arc::new(MemoryTicketStore::open()))
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "tickets.session_ttl_secs",
                ..
            }
        ));
    }

    #[test]
    fn issuance_at_end_of_time_fails_without_panicking() {
        let (engine, clock, _) = engine();
        clock.set(chrono::DateTime::<chrono::Utc>::MAX_UTC);

        let err = engine.create_tgt("alice", attrs()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(
            engine.issue_login_ticket().unwrap_err().code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn service_validation_releases_session_attributes() {
        let (engine, _, _) = engine();
        let tgt = engine.create_tgt("alice", attrs()).unwrap();
        let st = engine
            .issue_service_ticket(tgt.id().as_str(), SVC, false)
            .unwrap();

        let success = engine
            .validate_service_ticket(&ValidationRequest::new(SVC, st.id().as_str()))
            .unwrap();
        assert_eq!(success.user, "alice");
        assert_eq!(success.attributes, attrs());
        assert_eq!(success.pgt_iou, None);
        assert!(success.proxies.is_empty());
    }

    #[test]
    fn pgt_url_yields_iou() {
        let (engine, _, callback) = engine();
        let tgt = engine.create_tgt("alice", attrs()).unwrap();
        let st = engine
            .issue_service_ticket(tgt.id().as_str(), SVC, false)
            .unwrap();

        let success = engine
            .validate_service_ticket(
                &ValidationRequest::new(SVC, st.id().as_str()).with_pgt_url("https://svc1/pgt"),
            )
            .unwrap();
        let iou = success.pgt_iou.unwrap();
        let pgt = callback.pgt_for_iou(&iou).unwrap();

        let owner = engine.resolve_pgt_owner_chain(&pgt).unwrap();
        assert_eq!(owner.id(), tgt.id());
    }

    #[test]
    fn rejected_callback_still_validates_without_iou() {
        let (engine, _, callback) = engine();
        callback.set_rejecting(true);
        let tgt = engine.create_tgt("alice", attrs()).unwrap();
        let st = engine
            .issue_service_ticket(tgt.id().as_str(), SVC, false)
            .unwrap();

        let success = engine
            .validate_service_ticket(
                &ValidationRequest::new(SVC, st.id().as_str()).with_pgt_url("https://svc1/pgt"),
            )
            .unwrap();
        assert_eq!(success.user, "alice");
        assert_eq!(success.pgt_iou, None);
    }

    #[test]
    fn issue_requires_live_session() {
        let (engine, clock, _) = engine();
        let tgt = engine.create_tgt("alice", attrs()).unwrap();
        clock.advance(Duration::days(3));

        let err = engine
            .issue_service_ticket(tgt.id().as_str(), SVC, false)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTicket);
    }

    #[test]
    fn purge_and_shutdown() {
        let (engine, clock, _) = engine();
        engine.issue_login_ticket().unwrap();
        clock.advance(Duration::seconds(301));
        assert_eq!(engine.purge_expired().unwrap(), 1);

        engine.shutdown();
        let err = engine.issue_login_ticket().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.status().http_status(), 500);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let mut config = CasConfig::default();
        config.tickets.service_ticket_ttl_secs = 0;
        let result = CasEngine::builder(Arc::new(MemoryTicketStore::open()))
            .config(config)
            .build();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn success_serializes_without_missing_iou() {
        let success = ValidationSuccess {
            user: "alice".to_string(),
            attributes: Attributes::new(),
            pgt_iou: None,
            proxies: vec!["https://svc1/".to_string()],
        };
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["user"], "alice");
        assert!(json.get("pgt_iou").is_none());
        assert_eq!(json["proxies"][0], "https://svc1/");
    }
}
