//! In-memory audit trail recorder.

use parking_lot::Mutex;

use super::{AuditEvent, AuditEventKind};

/// Thread-safe in-memory recorder for audit events.
///
/// Shared between request threads through the engine. Operators and tests
/// read it back with [`events`](Self::events).
///
/// # Example
///
/// ```
/// use cas_core::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
///
/// let trail = AuditTrail::new();
/// trail.record(AuditEvent::new(AuditEventKind::SessionCreated, AuditOutcome::Success));
///
/// assert_eq!(trail.len(), 1);
/// assert_eq!(trail.count(AuditEventKind::SessionCreated), 1);
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }

    /// Returns a snapshot of all events in recording order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Returns how many recorded events have the given kind.
    pub fn count(&self, kind: AuditEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Removes all events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
