//! Ticket-granting tickets: authenticated sessions.

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome};
use crate::context::TicketContext;
use crate::error::TicketError;
use crate::store::CascadeReport;
use crate::ticket::{redact, Attributes, Ticket, TicketBody, TicketKind};

/// Creates, finds, and destroys sessions.
///
/// A live session lets its holder obtain service tickets without presenting
/// credentials again. Destroying a session removes every ticket chained
/// beneath it in one store transaction.
pub struct TicketGrantingTickets<'a> {
    ctx: &'a TicketContext,
}

impl<'a> TicketGrantingTickets<'a> {
    pub(crate) fn new(ctx: &'a TicketContext) -> Self {
        Self { ctx }
    }

    /// Opens a session for `owner`.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` if `owner` is empty; `INTERNAL_ERROR` on store failure.
    pub fn create(&self, owner: &str, extra_attributes: Attributes) -> Result<Ticket, TicketError> {
        if owner.is_empty() {
            return Err(TicketError::MissingParameter("username"));
        }
        let now = self.ctx.now();
        let ticket = Ticket::new(
            owner,
            now,
            self.ctx.expiry(now, self.ctx.tickets.session_ttl())?,
            TicketBody::Granting { extra_attributes },
        );
        let ticket = self
            .ctx
            .store
            .create(ticket)
            .map_err(|e| self.ctx.store_fault("create session", e))?;

        self.ctx.auditor.emit(
            AuditEvent::new(AuditEventKind::SessionCreated, AuditOutcome::Success)
                .with_principal(owner)
                .with_ticket(TicketKind::Granting, ticket.id().redacted()),
        );
        Ok(ticket)
    }

    /// Looks up a session by value. Expired sessions are still returned.
    pub fn find_by_value(&self, value: &str) -> Result<Option<Ticket>, TicketError> {
        Ok(self
            .ctx
            .find(value)?
            .filter(|t| t.kind() == TicketKind::Granting))
    }

    /// Returns the session if it can be reused for single sign-on.
    ///
    /// # Errors
    ///
    /// `INVALID_TICKET` if the value is malformed, unknown, not a session, or
    /// expired.
    pub fn validate(&self, value: &str) -> Result<Ticket, TicketError> {
        self.ctx.check_shape(value)?;
        let ticket = redact(value);
        let Some(tgt) = self.ctx.find(value)? else {
            return Err(TicketError::NotFound { ticket });
        };
        if tgt.kind() != TicketKind::Granting {
            return Err(TicketError::WrongKind {
                ticket,
                expected: TicketKind::Granting,
                found: tgt.kind(),
            });
        }
        if tgt.is_expired_at(self.ctx.now()) {
            tracing::debug!(%ticket, "session expired");
            return Err(TicketError::Expired { ticket });
        }
        Ok(tgt)
    }

    /// Destroys a session and everything chained beneath it.
    ///
    /// Unknown, malformed, or non-session values are a no-op.
    pub fn destroy(&self, value: &str) -> Result<CascadeReport, TicketError> {
        if self.ctx.check_shape(value).ok() != Some(TicketKind::Granting) {
            return Ok(CascadeReport::default());
        }
        let owner = self.ctx.find(value)?.map(|t| t.owner().to_string());
        let report = self
            .ctx
            .store
            .destroy_cascade(value)
            .map_err(|e| self.ctx.store_fault("destroy session", e))?;

        if report.tgt_destroyed {
            tracing::info!(
                ticket = %redact(value),
                pgts = report.pgts_destroyed,
                tickets = report.tickets_destroyed,
                "session destroyed"
            );
            let mut event = AuditEvent::new(AuditEventKind::SessionDestroyed, AuditOutcome::Success)
                .with_ticket(TicketKind::Granting, redact(value));
            if let Some(owner) = owner {
                event = event.with_principal(owner);
            }
            self.ctx.auditor.emit(event);
        }
        Ok(report)
    }
}
