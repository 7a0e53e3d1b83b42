//! Collaborators shared by every ticket component.
//!
//! The engine owns one [`TicketContext`]. Each component borrows it for the
//! duration of a call, so there is exactly one store, one clock and one
//! auditor per engine and no hidden globals.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, Auditor};
use crate::callback::ProxyCallback;
use crate::clock::Clock;
use crate::config::TicketConfig;
use crate::error::{ErrorCode, StoreError, TicketError};
use crate::service_url::ServiceMatcher;
use crate::store::{ConsumeOutcome, TicketStore};
use crate::ticket::{parse_presented, redact, Ticket, TicketKind};

/// Everything a ticket component needs to do its work.
pub(crate) struct TicketContext {
    pub(crate) store: Arc<dyn TicketStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) tickets: TicketConfig,
    pub(crate) services: ServiceMatcher,
    pub(crate) require_https_callback: bool,
    pub(crate) callback: Option<Arc<dyn ProxyCallback>>,
    pub(crate) auditor: Auditor,
}

impl TicketContext {
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Rejects values that cannot be tickets before they reach the store.
    pub(crate) fn check_shape(&self, value: &str) -> Result<TicketKind, TicketError> {
        parse_presented(value, self.tickets.max_ticket_len).ok_or(TicketError::Malformed)
    }

    /// Expiry of a ticket issued at `now` that lives for `ttl`.
    ///
    /// Fails with `INTERNAL_ERROR` instead of overflowing the clock range.
    pub(crate) fn expiry(
        &self,
        now: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Result<DateTime<Utc>, TicketError> {
        ttl.and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                tracing::error!(%now, "ticket lifetime out of range");
                TicketError::LifetimeOverflow
            })
    }

    /// Logs a storage failure and converts it to `INTERNAL_ERROR`.
    pub(crate) fn store_fault(&self, operation: &'static str, err: StoreError) -> TicketError {
        tracing::error!(operation, error = %err, "ticket store failure");
        TicketError::Internal(err)
    }

    /// Looks up a ticket by value, treating malformed values as absent.
    pub(crate) fn find(&self, value: &str) -> Result<Option<Ticket>, TicketError> {
        if self.check_shape(value).is_err() {
            return Ok(None);
        }
        self.store
            .find(value)
            .map_err(|e| self.store_fault("find", e))
    }

    /// Consumes a single-use ticket of one of the `accept` kinds.
    ///
    /// Every failure is mapped to a typed error. Replays are audited as
    /// security events; plain expiry is only logged at debug.
    pub(crate) fn consume(
        &self,
        value: &str,
        accept: &[TicketKind],
        expected: TicketKind,
    ) -> Result<Ticket, TicketError> {
        self.check_shape(value)?;
        let outcome = self
            .store
            .consume(value, accept, self.now())
            .map_err(|e| self.store_fault("consume", e))?;

        let ticket = redact(value);
        match outcome {
            ConsumeOutcome::Consumed(t) => Ok(t),
            ConsumeOutcome::NotFound => {
                tracing::debug!(%ticket, "ticket not found");
                Err(TicketError::NotFound { ticket })
            }
            ConsumeOutcome::WrongKind(t) => {
                tracing::debug!(%ticket, found = %t.kind(), %expected, "ticket of wrong kind");
                Err(TicketError::WrongKind {
                    ticket,
                    expected,
                    found: t.kind(),
                })
            }
            ConsumeOutcome::Expired(t) => {
                tracing::debug!(%ticket, expires_at = %t.expires_at(), "ticket expired");
                Err(TicketError::Expired { ticket })
            }
            ConsumeOutcome::AlreadyConsumed(t) => {
                let mut event = AuditEvent::new(AuditEventKind::ReplayAttempt, AuditOutcome::Denied)
                    .with_ticket(t.kind(), ticket.clone())
                    .with_code(ErrorCode::InvalidTicket);
                if !t.owner().is_empty() {
                    event = event.with_principal(t.owner());
                }
                if let Some(service) = t.service() {
                    event = event.with_service(service);
                }
                self.auditor.emit(event);
                Err(TicketError::AlreadyConsumed { ticket })
            }
        }
    }

    /// Audits a rejected validation. Replays were already audited by
    /// [`consume`](Self::consume).
    pub(crate) fn audit_rejection(
        &self,
        err: &TicketError,
        kind: TicketKind,
        value: &str,
        service: &str,
    ) {
        if err.is_replay() {
            return;
        }
        let outcome = match err.code() {
            ErrorCode::InternalError => AuditOutcome::Error,
            _ => AuditOutcome::Denied,
        };
        let mut event = AuditEvent::new(AuditEventKind::ValidationFailed, outcome)
            .with_ticket(kind, redact(value))
            .with_code(err.code());
        if !service.is_empty() {
            event = event.with_service(service);
        }
        self.auditor.emit(event);
    }

    /// Audits a newly issued ticket.
    pub(crate) fn audit_issued(&self, ticket: &Ticket, service: Option<&str>) {
        let mut event = AuditEvent::new(AuditEventKind::TicketIssued, AuditOutcome::Success)
            .with_ticket(ticket.kind(), ticket.id().redacted());
        if !ticket.owner().is_empty() {
            event = event.with_principal(ticket.owner());
        }
        if let Some(service) = service {
            event = event.with_service(service);
        }
        self.auditor.emit(event);
    }
}
