//! Audit event schema.
//!
//! Events carry only safe metadata: ticket values appear redacted, and no
//! password or proxy-granting-ticket value is ever recorded.

use std::fmt;

use crate::error::ErrorCode;
use crate::ticket::TicketKind;

/// Kind of ticket lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    /// A ticket of any kind was issued
    TicketIssued,
    /// A ticket validated successfully
    TicketValidated,
    /// A validation attempt failed for a reason other than replay
    ValidationFailed,
    /// An already-consumed single-use ticket was presented again
    ReplayAttempt,
    /// A session (ticket-granting ticket) was created
    SessionCreated,
    /// A session and its chained tickets were destroyed
    SessionDestroyed,
    /// A credential check failed
    AuthenticationFailed,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventKind::TicketIssued => write!(f, "ticket_issued"),
            AuditEventKind::TicketValidated => write!(f, "ticket_validated"),
            AuditEventKind::ValidationFailed => write!(f, "validation_failed"),
            AuditEventKind::ReplayAttempt => write!(f, "replay_attempt"),
            AuditEventKind::SessionCreated => write!(f, "session_created"),
            AuditEventKind::SessionDestroyed => write!(f, "session_destroyed"),
            AuditEventKind::AuthenticationFailed => write!(f, "authentication_failed"),
        }
    }
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Operation succeeded
    Success,
    /// Operation was refused
    Denied,
    /// Operation failed due to an internal error
    Error,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Error => write!(f, "error"),
        }
    }
}

/// A structured audit event.
///
/// # Example
///
/// ```
/// use cas_core::audit::{AuditEvent, AuditEventKind, AuditOutcome};
/// use cas_core::TicketKind;
///
/// let event = AuditEvent::new(AuditEventKind::TicketIssued, AuditOutcome::Success)
///     .with_principal("alice")
///     .with_ticket(TicketKind::Service, "ST-1a2b3c…")
///     .with_service("https://svc1/");
///
/// assert_eq!(event.principal(), Some("alice"));
/// assert_eq!(event.ticket_kind(), Some(TicketKind::Service));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    kind: AuditEventKind,
    outcome: AuditOutcome,
    /// Username, when known
    principal: Option<String>,
    ticket_kind: Option<TicketKind>,
    /// Redacted ticket value
    ticket: Option<String>,
    /// Normalized service URL
    service: Option<String>,
    code: Option<ErrorCode>,
    request_id: Option<String>,
}

impl AuditEvent {
    /// Creates an event with only the required fields.
    pub fn new(kind: AuditEventKind, outcome: AuditOutcome) -> Self {
        Self {
            kind,
            outcome,
            principal: None,
            ticket_kind: None,
            ticket: None,
            service: None,
            code: None,
            request_id: None,
        }
    }

    /// Sets the principal.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Sets the ticket kind and its redacted value.
    ///
    /// Callers pass the redacted form; this type never redacts for them.
    pub fn with_ticket(mut self, kind: TicketKind, redacted: impl Into<String>) -> Self {
        self.ticket_kind = Some(kind);
        self.ticket = Some(redacted.into());
        self
    }

    /// Sets the service URL.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Sets the protocol error code.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Sets the request correlation id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns the event kind.
    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    /// Returns the principal, if known.
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// Returns the ticket kind, if set.
    pub fn ticket_kind(&self) -> Option<TicketKind> {
        self.ticket_kind
    }

    /// Returns the redacted ticket value, if set.
    pub fn ticket(&self) -> Option<&str> {
        self.ticket.as_deref()
    }

    /// Returns the service URL, if set.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Returns the error code, if set.
    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    /// Returns the request id, if set.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEvent[kind={}, outcome={}, principal={}",
            self.kind,
            self.outcome,
            self.principal.as_deref().unwrap_or("<none>")
        )?;

        if let (Some(kind), Some(ticket)) = (self.ticket_kind, &self.ticket) {
            write!(f, ", ticket={} ({})", ticket, kind)?;
        }
        if let Some(service) = &self.service {
            write!(f, ", service={}", service)?;
        }
        if let Some(code) = self.code {
            write!(f, ", code={}", code)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, ", request_id={}", request_id)?;
        }

        write!(f, "]")
    }
}
