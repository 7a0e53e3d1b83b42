//! Emits audit events through `tracing` and, optionally, an [`AuditTrail`].

use std::sync::Arc;

use super::{AuditEvent, AuditEventKind, AuditTrail};

/// Audit event emitter shared by every engine component.
///
/// Every event becomes a structured `tracing` record. Security-relevant
/// events (replays, failed credential checks) go to the `cas_security`
/// target at `warn`; everything else goes to `cas_audit` at `info`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cas_core::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail, Auditor};
///
/// let trail = Arc::new(AuditTrail::new());
/// let auditor = Auditor::with_trail(trail.clone());
///
/// auditor.emit(AuditEvent::new(AuditEventKind::SessionCreated, AuditOutcome::Success));
/// assert_eq!(trail.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Auditor {
    trail: Option<Arc<AuditTrail>>,
}

impl Auditor {
    /// Creates an auditor that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an auditor that logs and records into `trail`.
    pub fn with_trail(trail: Arc<AuditTrail>) -> Self {
        Self { trail: Some(trail) }
    }

    /// Returns the attached trail, if any.
    pub fn trail(&self) -> Option<&Arc<AuditTrail>> {
        self.trail.as_ref()
    }

    /// Emits an event.
    pub fn emit(&self, event: AuditEvent) {
        match event.kind() {
            AuditEventKind::ReplayAttempt | AuditEventKind::AuthenticationFailed => {
                tracing::warn!(
                    target: "cas_security",
                    kind = %event.kind(),
                    outcome = %event.outcome(),
                    principal = ?event.principal(),
                    ticket_kind = ?event.ticket_kind(),
                    ticket = ?event.ticket(),
                    service = ?event.service(),
                    code = ?event.code().map(|c| c.as_str()),
                    request_id = ?event.request_id(),
                    "security event"
                );
            }
            _ => {
                tracing::info!(
                    target: "cas_audit",
                    kind = %event.kind(),
                    outcome = %event.outcome(),
                    principal = ?event.principal(),
                    ticket_kind = ?event.ticket_kind(),
                    ticket = ?event.ticket(),
                    service = ?event.service(),
                    code = ?event.code().map(|c| c.as_str()),
                    request_id = ?event.request_id(),
                    "audit event"
                );
            }
        }

        if let Some(trail) = &self.trail {
            trail.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditOutcome;

    #[test]
    fn emit_without_trail_does_not_panic() {
        let auditor = Auditor::new();
        assert!(auditor.trail().is_none());
        auditor.emit(AuditEvent::new(
            AuditEventKind::ReplayAttempt,
            AuditOutcome::Denied,
        ));
    }

    #[test]
    fn emit_records_into_trail() {
        let trail = Arc::new(AuditTrail::new());
        let auditor = Auditor::with_trail(trail.clone());

        auditor.emit(
            AuditEvent::new(AuditEventKind::AuthenticationFailed, AuditOutcome::Denied)
                .with_principal("mallory"),
        );
        auditor.emit(AuditEvent::new(
            AuditEventKind::TicketIssued,
            AuditOutcome::Success,
        ));

        let events = trail.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].principal(), Some("mallory"));
    }

    #[test]
    fn clones_share_the_trail() {
        let trail = Arc::new(AuditTrail::new());
        let a = Auditor::with_trail(trail.clone());
        let b = a.clone();

        a.emit(AuditEvent::new(AuditEventKind::TicketIssued, AuditOutcome::Success));
        b.emit(AuditEvent::new(AuditEventKind::TicketIssued, AuditOutcome::Success));
        assert_eq!(trail.len(), 2);
    }
}
