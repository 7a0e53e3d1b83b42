//! Ticket storage with atomic single-use consumption.
//!
//! The [`TicketStore`] trait is the seam to persistence. Every method is one
//! transaction: a `consume` is a single check-and-set on the consumed flag,
//! and a `destroy_cascade` removes a session and everything chained beneath
//! it without any other operation observing the intermediate state.
//!
//! [`MemoryTicketStore`] implements the contract with one mutex around the
//! ticket table and the chain index.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use subtle::ConstantTimeEq;

use crate::error::StoreError;
use crate::ticket::{redact, Ticket, TicketId, TicketKind};

/// Result of a `consume` call that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    /// This call consumed the ticket. The returned copy is marked consumed.
    Consumed(Ticket),
    /// Someone consumed the ticket before this call.
    AlreadyConsumed(Ticket),
    /// The ticket is past its expiry; it was left untouched.
    Expired(Ticket),
    /// The ticket exists but its kind is not accepted; it was left untouched.
    WrongKind(Ticket),
    /// No ticket has this value.
    NotFound,
}

/// What a cascade removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Whether the session itself existed
    pub tgt_destroyed: bool,
    /// Proxy-granting tickets removed
    pub pgts_destroyed: usize,
    /// Service and proxy tickets removed
    pub tickets_destroyed: usize,
}

/// Atomic operations over tickets keyed by value.
pub trait TicketStore: Send + Sync {
    /// Stores a new ticket.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Duplicate`] if the value is already present.
    /// - [`StoreError::ParentMissing`] if the ticket is chained under a
    ///   ticket that does not exist (e.g. a session destroyed concurrently).
    fn create(&self, ticket: Ticket) -> Result<Ticket, StoreError>;

    /// Looks up a ticket by value.
    fn find(&self, value: &str) -> Result<Option<Ticket>, StoreError>;

    /// Atomically consumes a single-use ticket of one of the `accept` kinds.
    ///
    /// Concurrent callers racing on one value observe exactly one
    /// [`ConsumeOutcome::Consumed`]; all others get
    /// [`ConsumeOutcome::AlreadyConsumed`].
    fn consume(
        &self,
        value: &str,
        accept: &[TicketKind],
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Removes one ticket. Returns whether it existed.
    fn destroy(&self, value: &str) -> Result<bool, StoreError>;

    /// Removes a session and every ticket whose chain roots at it.
    fn destroy_cascade(&self, tgt_value: &str) -> Result<CascadeReport, StoreError>;

    /// Removes every ticket expired at `now`. Expired sessions cascade.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Closes the store. Later operations fail with [`StoreError::Closed`].
    fn close(&self);

    /// Returns true until [`close`](Self::close) is called.
    fn is_open(&self) -> bool;
}

#[derive(Debug, Default)]
struct StoreState {
    open: bool,
    tickets: HashMap<String, Ticket>,
    /// Session value -> every chained ticket value rooted at it
    by_root: HashMap<String, HashSet<String>>,
}

impl StoreState {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    /// Map lookup followed by a constant-time comparison of the stored value.
    fn get_mut(&mut self, value: &str) -> Option<&mut Ticket> {
        let ticket = self.tickets.get_mut(value)?;
        let matches: bool = ticket
            .id()
            .as_str()
            .as_bytes()
            .ct_eq(value.as_bytes())
            .into();
        if matches {
            Some(ticket)
        } else {
            None
        }
    }

    fn remove(&mut self, value: &str) -> Option<Ticket> {
        let ticket = self.tickets.remove(value)?;
        if let Some(root) = ticket.root_tgt() {
            if let Some(members) = self.by_root.get_mut(root.as_str()) {
                members.remove(value);
                if members.is_empty() {
                    self.by_root.remove(root.as_str());
                }
            }
        }
        Some(ticket)
    }

    fn cascade(&mut self, tgt_value: &str) -> CascadeReport {
        let mut report = CascadeReport::default();
        for member in self.by_root.remove(tgt_value).unwrap_or_default() {
            if let Some(ticket) = self.tickets.remove(&member) {
                match ticket.kind() {
                    TicketKind::ProxyGranting => report.pgts_destroyed += 1,
                    _ => report.tickets_destroyed += 1,
                }
            }
        }
        report.tgt_destroyed = self.tickets.remove(tgt_value).is_some();
        report
    }
}

/// In-memory [`TicketStore`].
///
/// # Thread Safety
///
/// All operations take one `parking_lot::Mutex`, so each call is a single
/// critical section. No lock is held between calls.
///
/// # Example
///
/// ```
/// use cas_core::{MemoryTicketStore, TicketStore};
///
/// let store = MemoryTicketStore::open();
/// assert!(store.is_open());
/// assert!(store.is_empty());
///
/// store.close();
/// assert!(store.find("ST-anything").is_err());
/// ```
#[derive(Debug)]
pub struct MemoryTicketStore {
    state: Mutex<StoreState>,
}

impl MemoryTicketStore {
    /// Opens an empty store.
    pub fn open() -> Self {
        Self {
            state: Mutex::new(StoreState {
                open: true,
                ..StoreState::default()
            }),
        }
    }

    /// Returns the number of stored tickets.
    pub fn len(&self) -> usize {
        self.state.lock().tickets.len()
    }

    /// Returns true if no tickets are stored.
    pub fn is_empty(&self) -> bool {
        self.state.lock().tickets.is_empty()
    }
}

impl TicketStore for MemoryTicketStore {
    fn create(&self, ticket: Ticket) -> Result<Ticket, StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let value = ticket.id().as_str().to_string();
        if state.tickets.contains_key(&value) {
            return Err(StoreError::Duplicate(redact(&value)));
        }

        if let Some(parent) = ticket.parent() {
            if !state.tickets.contains_key(parent.as_str()) {
                return Err(StoreError::ParentMissing {
                    parent: parent.redacted(),
                });
            }
        }
        if let Some(root) = ticket.root_tgt() {
            if !state.tickets.contains_key(root.as_str()) {
                return Err(StoreError::ParentMissing {
                    parent: root.redacted(),
                });
            }
            state
                .by_root
                .entry(root.as_str().to_string())
                .or_default()
                .insert(value.clone());
        }

        state.tickets.insert(value, ticket.clone());
        Ok(ticket)
    }

    fn find(&self, value: &str) -> Result<Option<Ticket>, StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        Ok(state.get_mut(value).map(|t| t.clone()))
    }

    fn consume(
        &self,
        value: &str,
        accept: &[TicketKind],
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let Some(ticket) = state.get_mut(value) else {
            return Ok(ConsumeOutcome::NotFound);
        };

        if !accept.contains(&ticket.kind()) || !ticket.kind().is_single_use() {
            return Ok(ConsumeOutcome::WrongKind(ticket.clone()));
        }
        if ticket.is_consumed() {
            return Ok(ConsumeOutcome::AlreadyConsumed(ticket.clone()));
        }
        if ticket.is_expired_at(now) {
            return Ok(ConsumeOutcome::Expired(ticket.clone()));
        }

        ticket.mark_consumed();
        Ok(ConsumeOutcome::Consumed(ticket.clone()))
    }

    fn destroy(&self, value: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        Ok(state.remove(value).is_some())
    }

    fn destroy_cascade(&self, tgt_value: &str) -> Result<CascadeReport, StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        Ok(state.cascade(tgt_value))
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let before = state.tickets.len();
        let (sessions, others): (Vec<_>, Vec<_>) = state
            .tickets
            .values()
            .filter(|t| t.is_expired_at(now))
            .map(|t| (t.kind(), t.id().as_str().to_string()))
            .partition(|(kind, _)| *kind == TicketKind::Granting);

        for (_, value) in sessions {
            state.cascade(&value);
        }
        for (_, value) in others {
            state.remove(&value);
        }
        Ok(before - state.tickets.len())
    }

    fn close(&self) {
        self.state.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }
}
