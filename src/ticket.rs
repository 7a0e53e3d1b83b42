//! Ticket data model.
//!
//! Every ticket shares an identity, an owner, and a validity window. What a
//! ticket *is* lives in [`TicketBody`], a closed set of variants matched on
//! explicitly wherever behavior differs by kind.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

/// Extra attributes carried by a session and released on validation.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Number of random bytes in a ticket value.
const TICKET_ENTROPY_BYTES: usize = 32;

/// Characters of the random part kept when a ticket is logged.
const REDACTED_VISIBLE_CHARS: usize = 6;

/// The five ticket kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketKind {
    /// Anti-replay token for one login form submission
    Login,
    /// Authenticated session, root of every chain
    Granting,
    /// Single-use proof of identity for one service
    Service,
    /// Lets a service obtain tickets on the user's behalf
    ProxyGranting,
    /// Single-use ticket minted from a proxy-granting ticket
    Proxy,
}

impl TicketKind {
    /// Returns the value prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            TicketKind::Login => "LT",
            TicketKind::Granting => "TGT",
            TicketKind::Service => "ST",
            TicketKind::ProxyGranting => "PGT",
            TicketKind::Proxy => "PT",
        }
    }

    /// Returns true for kinds that may be consumed at most once.
    pub fn is_single_use(&self) -> bool {
        matches!(
            self,
            TicketKind::Login | TicketKind::Service | TicketKind::Proxy
        )
    }

    /// Infers the kind from a presented ticket value's prefix.
    ///
    /// Returns `None` for unknown prefixes, including the IOU prefix.
    pub fn from_value(value: &str) -> Option<Self> {
        let (prefix, rest) = value.split_once('-')?;
        if rest.is_empty() {
            return None;
        }
        match prefix {
            "LT" => Some(TicketKind::Login),
            "TGT" => Some(TicketKind::Granting),
            "ST" => Some(TicketKind::Service),
            "PGT" => Some(TicketKind::ProxyGranting),
            "PT" => Some(TicketKind::Proxy),
            _ => None,
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketKind::Login => write!(f, "login"),
            TicketKind::Granting => write!(f, "ticket-granting"),
            TicketKind::Service => write!(f, "service"),
            TicketKind::ProxyGranting => write!(f, "proxy-granting"),
            TicketKind::Proxy => write!(f, "proxy"),
        }
    }
}

/// An opaque, unguessable ticket value.
///
/// Values are `<PREFIX>-<hex>` where the hex part is drawn from the
/// operating system's CSPRNG. Nothing about the owner or any other ticket
/// feeds into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId(String);

impl TicketId {
    /// Generates a fresh value for the given kind.
    pub fn generate(kind: TicketKind) -> Self {
        Self::with_prefix(kind.prefix())
    }

    /// Generates a fresh proxy-granting-ticket IOU.
    pub fn generate_iou() -> Self {
        Self::with_prefix("PGTIOU")
    }

    fn with_prefix(prefix: &str) -> Self {
        let mut bytes = [0u8; TICKET_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(format!("{prefix}-{}", hex::encode(bytes)))
    }

    /// Wraps an existing value (e.g. one loaded from storage).
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the full value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a form safe for logs: the prefix plus a few characters.
    pub fn redacted(&self) -> String {
        redact(&self.0)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TicketId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Redacts any presented ticket value for logging.
pub(crate) fn redact(value: &str) -> String {
    match value.split_once('-') {
        Some((prefix, rest)) => {
            let visible: String = rest.chars().take(REDACTED_VISIBLE_CHARS).collect();
            format!("{prefix}-{visible}…")
        }
        None => "<malformed>".to_string(),
    }
}

/// Checks the shape of a presented value without touching storage.
///
/// Returns the kind implied by the prefix when the value is well-formed.
pub(crate) fn parse_presented(value: &str, max_len: usize) -> Option<TicketKind> {
    if value.is_empty() || value.len() > max_len {
        return None;
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return None;
    }
    TicketKind::from_value(value)
}

/// Kind-specific ticket contents.
#[derive(Debug, Clone, PartialEq)]
pub enum TicketBody {
    /// Login ticket: no extra fields.
    Login,
    /// Ticket-granting ticket.
    Granting {
        /// Attributes released to services validating tickets from this session
        extra_attributes: Attributes,
    },
    /// Service ticket.
    Service {
        /// Service the ticket was issued for
        service: String,
        /// Session that issued it
        granted_by_tgt: TicketId,
        /// True when issued right after a credential check
        from_new_login: bool,
    },
    /// Proxy-granting ticket.
    ProxyGranting {
        /// IOU returned to the validating service
        iou: TicketId,
        /// Callback URL the real value is delivered to
        callback_url: String,
        /// The service or proxy ticket whose validation earned this PGT
        parent: TicketId,
        /// Root session of the chain
        root_tgt: TicketId,
        /// Services of every ticket in the chain, most recent proxy first
        proxies: Vec<String>,
    },
    /// Proxy ticket.
    Proxy {
        /// Back-end service the ticket was issued for
        service: String,
        /// Proxy-granting ticket that minted it
        granted_by_pgt: TicketId,
        /// Root session of the chain
        root_tgt: TicketId,
    },
}

impl TicketBody {
    /// Returns the kind discriminant.
    pub fn kind(&self) -> TicketKind {
        match self {
            TicketBody::Login => TicketKind::Login,
            TicketBody::Granting { .. } => TicketKind::Granting,
            TicketBody::Service { .. } => TicketKind::Service,
            TicketBody::ProxyGranting { .. } => TicketKind::ProxyGranting,
            TicketBody::Proxy { .. } => TicketKind::Proxy,
        }
    }
}

/// A ticket of any kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    id: TicketId,
    owner: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    consumed: bool,
    body: TicketBody,
}

impl Ticket {
    /// Creates an unconsumed ticket with a freshly generated value.
    pub fn new(
        owner: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        body: TicketBody,
    ) -> Self {
        Self {
            id: TicketId::generate(body.kind()),
            owner: owner.into(),
            created_at,
            expires_at,
            consumed: false,
            body,
        }
    }

    /// Returns the ticket value.
    pub fn id(&self) -> &TicketId {
        &self.id
    }

    /// Returns the principal the ticket was issued for.
    ///
    /// Login tickets are issued before anyone is known and have an empty owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the issue time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the expiry time.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true once a single-use ticket has been used.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Returns the kind-specific contents.
    pub fn body(&self) -> &TicketBody {
        &self.body
    }

    /// Returns the kind discriminant.
    pub fn kind(&self) -> TicketKind {
        self.body.kind()
    }

    /// Returns true if the ticket is past its expiry at `now`.
    ///
    /// A ticket is still valid at exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns the service this ticket was issued for (ST and PT only).
    pub fn service(&self) -> Option<&str> {
        match &self.body {
            TicketBody::Service { service, .. } | TicketBody::Proxy { service, .. } => {
                Some(service)
            }
            _ => None,
        }
    }

    /// Returns the IOU of a proxy-granting ticket.
    pub fn iou(&self) -> Option<&TicketId> {
        match &self.body {
            TicketBody::ProxyGranting { iou, .. } => Some(iou),
            _ => None,
        }
    }

    /// Returns true for a service ticket issued right after a credential check.
    pub fn is_from_new_login(&self) -> bool {
        matches!(
            self.body,
            TicketBody::Service {
                from_new_login: true,
                ..
            }
        )
    }

    /// Returns the recorded proxy chain (PGT only), most recent proxy first.
    pub fn proxies(&self) -> &[String] {
        match &self.body {
            TicketBody::ProxyGranting { proxies, .. } => proxies,
            _ => &[],
        }
    }

    /// Returns the ticket this one is chained directly under, if any.
    pub fn parent(&self) -> Option<&TicketId> {
        match &self.body {
            TicketBody::Login | TicketBody::Granting { .. } => None,
            TicketBody::Service { granted_by_tgt, .. } => Some(granted_by_tgt),
            TicketBody::ProxyGranting { parent, .. } => Some(parent),
            TicketBody::Proxy { granted_by_pgt, .. } => Some(granted_by_pgt),
        }
    }

    /// Returns the session at the root of this ticket's chain, if any.
    pub fn root_tgt(&self) -> Option<&TicketId> {
        match &self.body {
            TicketBody::Login | TicketBody::Granting { .. } => None,
            TicketBody::Service { granted_by_tgt, .. } => Some(granted_by_tgt),
            TicketBody::ProxyGranting { root_tgt, .. } | TicketBody::Proxy { root_tgt, .. } => {
                Some(root_tgt)
            }
        }
    }

    pub(crate) fn mark_consumed(&mut self) {
        self.consumed = true;
    }
}
