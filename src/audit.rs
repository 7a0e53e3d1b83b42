//! Audit trail for ticket lifecycle events.
//!
//! This module provides:
//! - `AuditEvent`: structured event schema (redacted ticket values only)
//! - `Auditor`: emits events through `tracing` and an optional trail
//! - `AuditTrail`: thread-safe in-memory event recorder
//!
//! Replay attempts are recorded as their own kind, so they can be told apart
//! from plain expiry even though both surface as `INVALID_TICKET`.

mod auditor;
mod event;
mod trail;

pub use auditor::Auditor;
pub use event::{AuditEvent, AuditEventKind, AuditOutcome};
pub use trail::AuditTrail;
