//! Service tickets: single-use proof of identity for one service.

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome};
use crate::context::TicketContext;
use crate::error::{StoreError, TicketError};
use crate::ticket::{redact, Ticket, TicketBody, TicketKind};

/// Issues and validates service tickets.
pub struct ServiceTickets<'a> {
    ctx: &'a TicketContext,
}

impl<'a> ServiceTickets<'a> {
    pub(crate) fn new(ctx: &'a TicketContext) -> Self {
        Self { ctx }
    }

    /// Issues a service ticket for `service` under session `tgt`.
    ///
    /// The service URL is normalized before it is bound to the ticket.
    /// `from_new_login` marks tickets issued right after a credential check;
    /// only those satisfy a `renew` validation.
    ///
    /// # Errors
    ///
    /// - `INVALID_REQUEST` if the service URL is missing or unparseable.
    /// - `INVALID_TICKET` if `tgt` is not a live session, including one
    ///   destroyed while this call was in flight.
    pub fn issue(
        &self,
        tgt: &Ticket,
        service: &str,
        from_new_login: bool,
    ) -> Result<Ticket, TicketError> {
        let now = self.ctx.now();
        let session = tgt.id().redacted();
        if tgt.kind() != TicketKind::Granting {
            return Err(TicketError::WrongKind {
                ticket: session,
                expected: TicketKind::Granting,
                found: tgt.kind(),
            });
        }
        if tgt.is_expired_at(now) {
            return Err(TicketError::Expired { ticket: session });
        }
        let service = self.ctx.services.normalize(service)?;

        let ticket = Ticket::new(
            tgt.owner(),
            now,
            self.ctx.expiry(now, self.ctx.tickets.service_ticket_ttl())?,
            TicketBody::Service {
                service: service.clone(),
                granted_by_tgt: tgt.id().clone(),
                from_new_login,
            },
        );
        let ticket = match self.ctx.store.create(ticket) {
            Ok(ticket) => ticket,
            Err(StoreError::ParentMissing { .. }) => {
                tracing::debug!(%session, "session destroyed before service ticket issued");
                return Err(TicketError::NotFound { ticket: session });
            }
            Err(e) => return Err(self.ctx.store_fault("create service ticket", e)),
        };

        self.ctx.audit_issued(&ticket, Some(&service));
        Ok(ticket)
    }

    /// Validates and consumes a service ticket.
    ///
    /// The ticket is consumed before the service comparison, so a ticket
    /// presented for the wrong service is burned.
    ///
    /// # Errors
    ///
    /// - `INVALID_REQUEST` if either parameter is missing or the service is
    ///   unparseable. The ticket is left untouched.
    /// - `INVALID_TICKET` if the ticket is malformed, unknown, not a service
    ///   ticket, expired, already used, or `renew` was requested for a ticket
    ///   not issued from a fresh login.
    /// - `INVALID_SERVICE` if the service differs from the one the ticket was
    ///   issued for.
    /// - `INTERNAL_ERROR` on store failure.
    pub fn validate(&self, service: &str, ticket: &str, renew: bool) -> Result<Ticket, TicketError> {
        let result = self.validate_inner(service, ticket, renew);
        match &result {
            Ok(st) => self.ctx.auditor.emit(
                AuditEvent::new(AuditEventKind::TicketValidated, AuditOutcome::Success)
                    .with_principal(st.owner())
                    .with_ticket(TicketKind::Service, st.id().redacted())
                    .with_service(service),
            ),
            Err(err) => self
                .ctx
                .audit_rejection(err, TicketKind::Service, ticket, service),
        }
        result
    }

    fn validate_inner(&self, service: &str, ticket: &str, renew: bool) -> Result<Ticket, TicketError> {
        if ticket.is_empty() {
            return Err(TicketError::MissingParameter("ticket"));
        }
        let presented = self.ctx.services.normalize(service)?;
        let st = self
            .ctx
            .consume(ticket, &[TicketKind::Service], TicketKind::Service)?;
        check_bound_service(self.ctx, &st, &presented)?;
        if renew && !st.is_from_new_login() {
            return Err(TicketError::NotRenewed {
                ticket: redact(ticket),
            });
        }
        Ok(st)
    }
}

/// Compares the service a consumed ST or PT was issued for with the
/// normalized presented service.
pub(crate) fn check_bound_service(
    ctx: &TicketContext,
    ticket: &Ticket,
    presented: &str,
) -> Result<(), TicketError> {
    let issued = ticket.service().unwrap_or_default();
    if ctx.services.matches(issued, presented) {
        Ok(())
    } else {
        tracing::info!(
            ticket = %ticket.id().redacted(),
            issued,
            presented,
            "service mismatch"
        );
        Err(TicketError::ServiceMismatch {
            ticket: ticket.id().redacted(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::fixture;
    use crate::error::ErrorCode;
    use crate::granting::TicketGrantingTickets;
    use crate::ticket::Attributes;
    use chrono::Duration;

    const SVC: &str = "https://svc1/cb";

    fn session(ctx: &TicketContext) -> Ticket {
        TicketGrantingTickets::new(ctx)
            .create("alice", Attributes::new())
            .unwrap()
    }

    #[test]
    fn issue_binds_normalized_service() {
        let f = fixture();
        let tgt = session(&f.ctx);
        let st = ServiceTickets::new(&f.ctx)
            .issue(&tgt, "https://svc1/cb?ticket=ST-old", false)
            .unwrap();

        assert!(st.id().as_str().starts_with("ST-"));
        assert_eq!(st.owner(), "alice");
        assert_eq!(st.service(), Some(SVC));
        assert_eq!(st.root_tgt(), Some(tgt.id()));
    }

    #[test]
    fn validate_succeeds_once() {
        let f = fixture();
        let tgt = session(&f.ctx);
        let sts = ServiceTickets::new(&f.ctx);
        let st = sts.issue(&tgt, SVC, false).unwrap();

        let validated = sts.validate(SVC, st.id().as_str(), false).unwrap();
        assert_eq!(validated.owner(), "alice");

        let err = sts.validate(SVC, st.id().as_str(), false).unwrap_err();
        assert!(err.is_replay());
        assert_eq!(err.code(), ErrorCode::InvalidTicket);
        assert_eq!(f.trail.count(AuditEventKind::TicketValidated), 1);
        assert_eq!(f.trail.count(AuditEventKind::ReplayAttempt), 1);
        assert_eq!(f.trail.count(AuditEventKind::ValidationFailed), 0);
    }

    #[test]
    fn service_mismatch_burns_ticket() {
        let f = fixture();
        let tgt = session(&f.ctx);
        let sts = ServiceTickets::new(&f.ctx);
        let st = sts.issue(&tgt, "https://a.example/cb?x=1", false).unwrap();

        let err = sts
            .validate("https://a.example/cb?x=2", st.id().as_str(), false)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidService);

        let err = sts
            .validate("https://a.example/cb?x=1", st.id().as_str(), false)
            .unwrap_err();
        assert!(err.is_replay());
    }

    #[test]
    fn bad_parameters_leave_ticket_intact() {
        let f = fixture();
        let tgt = session(&f.ctx);
        let sts = ServiceTickets::new(&f.ctx);
        let st = sts.issue(&tgt, SVC, false).unwrap();

        assert_eq!(
            sts.validate("", st.id().as_str(), false).unwrap_err(),
            TicketError::MissingParameter("service")
        );
        assert_eq!(
            sts.validate(SVC, "", false).unwrap_err(),
            TicketError::MissingParameter("ticket")
        );
        assert_eq!(
            sts.validate("not a url", st.id().as_str(), false)
                .unwrap_err()
                .code(),
            ErrorCode::InvalidRequest
        );
        assert!(sts.validate(SVC, st.id().as_str(), false).is_ok());
    }

    #[test]
    fn expired_ticket_is_rejected() {
        let f = fixture();
        let tgt = session(&f.ctx);
        let sts = ServiceTickets::new(&f.ctx);
        let st = sts.issue(&tgt, SVC, false).unwrap();

        f.clock.advance(Duration::seconds(301));
        let err = sts.validate(SVC, st.id().as_str(), false).unwrap_err();
        assert!(matches!(err, TicketError::Expired { .. }));
        assert!(!err.is_replay());
    }

    #[test]
    fn renew_requires_fresh_login() {
        let f = fixture();
        let tgt = session(&f.ctx);
        let sts = ServiceTickets::new(&f.ctx);

        let sso = sts.issue(&tgt, SVC, false).unwrap();
        assert!(matches!(
            sts.validate(SVC, sso.id().as_str(), true),
            Err(TicketError::NotRenewed { .. })
        ));

        let fresh = sts.issue(&tgt, SVC, true).unwrap();
        assert!(sts.validate(SVC, fresh.id().as_str(), true).is_ok());
    }

    #[test]
    fn issue_under_destroyed_session_fails() {
        let f = fixture();
        let tgt = session(&f.ctx);
        TicketGrantingTickets::new(&f.ctx)
            .destroy(tgt.id().as_str())
            .unwrap();

        let err = ServiceTickets::new(&f.ctx)
            .issue(&tgt, SVC, false)
            .unwrap_err();
        assert!(matches!(err, TicketError::NotFound { .. }));
    }

    #[test]
    fn issue_under_expired_session_fails() {
        let f = fixture();
        let tgt = session(&f.ctx);
        f.clock.advance(Duration::days(3));

        let err = ServiceTickets::new(&f.ctx)
            .issue(&tgt, SVC, false)
            .unwrap_err();
        assert!(matches!(err, TicketError::Expired { .. }));
    }
}
