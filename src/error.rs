use std::fmt;

use crate::ticket::TicketKind;

/// Protocol error codes reported to relying services.
///
/// These are the only codes a caller ever sees. Finer-grained causes live in
/// [`TicketError`] and collapse onto one of these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed or missing required parameters
    InvalidRequest,
    /// Ticket absent, wrong kind, expired, or already consumed
    InvalidTicket,
    /// Service URL differs from the one the ticket was issued for
    InvalidService,
    /// Proxy-granting ticket chain broken or PGT not found
    BadPgt,
    /// Storage or invariant failure
    InternalError,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::InvalidTicket => "INVALID_TICKET",
            ErrorCode::InvalidService => "INVALID_SERVICE",
            ErrorCode::BadPgt => "BAD_PGT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns the status class this code maps to.
    pub fn status(&self) -> StatusClass {
        status_for(self.as_str())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fault class of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The caller sent something unusable (HTTP 422)
    ClientFault,
    /// The server could not complete the request (HTTP 500)
    ServerFault,
}

impl StatusClass {
    /// Returns the HTTP status code used by the reference transport.
    pub fn http_status(&self) -> u16 {
        match self {
            StatusClass::ClientFault => 422,
            StatusClass::ServerFault => 500,
        }
    }
}

/// Classifies an error code string.
///
/// Total over all inputs: codes starting with `INVALID_` and `BAD_PGT` are
/// client faults, everything else (including `INTERNAL_ERROR` and codes this
/// crate has never heard of) is a server fault.
///
/// # Examples
///
/// ```
/// use cas_core::{status_for, StatusClass};
///
/// assert_eq!(status_for("INVALID_TICKET"), StatusClass::ClientFault);
/// assert_eq!(status_for("BAD_PGT"), StatusClass::ClientFault);
/// assert_eq!(status_for("INTERNAL_ERROR"), StatusClass::ServerFault);
/// assert_eq!(status_for("SOMETHING_ELSE"), StatusClass::ServerFault);
/// ```
pub fn status_for(code: &str) -> StatusClass {
    match code {
        "BAD_PGT" => StatusClass::ClientFault,
        c if c.starts_with("INVALID_") => StatusClass::ClientFault,
        _ => StatusClass::ServerFault,
    }
}

/// Caller-facing description of every internal failure.
pub(crate) const INTERNAL_DESCRIPTION: &str = "An internal error occurred";

/// Failure of a ticket issuance or validation call.
///
/// Every variant maps to exactly one [`ErrorCode`]. Variants sharing a code
/// stay distinct so that logs can tell a replay from a plain expiry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketError {
    /// No ticket with this value exists.
    #[error("ticket '{ticket}' not recognized")]
    NotFound {
        /// The presented value (redacted)
        ticket: String,
    },

    /// The presented value cannot be a ticket at all.
    #[error("ticket value is malformed")]
    Malformed,

    /// The ticket exists but is not of a kind accepted here.
    #[error("ticket '{ticket}' is a {found} ticket, expected {expected}")]
    WrongKind {
        /// The presented value (redacted)
        ticket: String,
        /// Kind expected by the operation
        expected: TicketKind,
        /// Kind actually found
        found: TicketKind,
    },

    /// The ticket is past its expiry.
    #[error("ticket '{ticket}' has expired")]
    Expired {
        /// The presented value (redacted)
        ticket: String,
    },

    /// The single-use ticket was already used.
    #[error("ticket '{ticket}' has already been used")]
    AlreadyConsumed {
        /// The presented value (redacted)
        ticket: String,
    },

    /// The ticket was not issued from a fresh credential check but `renew` was requested.
    #[error("ticket '{ticket}' was not issued from a fresh login")]
    NotRenewed {
        /// The presented value (redacted)
        ticket: String,
    },

    /// The ticket was issued for a different service.
    #[error("ticket '{ticket}' does not match the supplied service")]
    ServiceMismatch {
        /// The presented value (redacted)
        ticket: String,
    },

    /// A required parameter is missing or empty.
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    /// A parameter is present but unusable.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The proxy-granting ticket or its chain is gone.
    #[error("proxy granting ticket '{ticket}' is not valid")]
    BadPgt {
        /// The proxy-granting ticket value (redacted)
        ticket: String,
    },

    /// A configured lifetime does not fit the clock's time range.
    #[error("ticket lifetime out of range")]
    LifetimeOverflow,

    /// The ticket store failed.
    #[error("internal error")]
    Internal(#[from] StoreError),
}

impl TicketError {
    /// Returns the protocol error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            TicketError::NotFound { .. }
            | TicketError::Malformed
            | TicketError::WrongKind { .. }
            | TicketError::Expired { .. }
            | TicketError::AlreadyConsumed { .. }
            | TicketError::NotRenewed { .. } => ErrorCode::InvalidTicket,
            TicketError::ServiceMismatch { .. } => ErrorCode::InvalidService,
            TicketError::MissingParameter(_) | TicketError::InvalidParameter { .. } => {
                ErrorCode::InvalidRequest
            }
            TicketError::BadPgt { .. } => ErrorCode::BadPgt,
            TicketError::LifetimeOverflow | TicketError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Returns the status class for this error.
    pub fn status(&self) -> StatusClass {
        self.code().status()
    }

    /// Returns true if this error records a replay attempt.
    pub fn is_replay(&self) -> bool {
        matches!(self, TicketError::AlreadyConsumed { .. })
    }

    /// Returns a description that is safe to show to the caller.
    ///
    /// Internal failures never expose their cause.
    pub fn description(&self) -> String {
        match self {
            TicketError::LifetimeOverflow | TicketError::Internal(_) => {
                INTERNAL_DESCRIPTION.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Failure of the ticket store itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store has been closed.
    #[error("ticket store is closed")]
    Closed,

    /// A ticket with this value already exists.
    #[error("duplicate ticket value '{0}'")]
    Duplicate(String),

    /// The ticket a new ticket should be chained under does not exist.
    #[error("parent ticket '{parent}' does not exist")]
    ParentMissing {
        /// The missing parent (redacted)
        parent: String,
    },

    /// The backing storage reported a failure.
    ///
    /// The memory store never fails this way. External [`TicketStore`]
    /// implementations (a database, a shared cache) report their own faults
    /// through it.
    ///
    /// [`TicketStore`]: crate::TicketStore
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_protocol_strings() {
        assert_eq!(ErrorCode::InvalidRequest.to_string(), "INVALID_REQUEST");
        assert_eq!(ErrorCode::InvalidTicket.to_string(), "INVALID_TICKET");
        assert_eq!(ErrorCode::InvalidService.to_string(), "INVALID_SERVICE");
        assert_eq!(ErrorCode::BadPgt.to_string(), "BAD_PGT");
        assert_eq!(ErrorCode::InternalError.to_string(), "INTERNAL_ERROR");
    }

    #[test]
    fn client_fault_codes() {
        for code in [
            ErrorCode::InvalidRequest,
            ErrorCode::InvalidTicket,
            ErrorCode::InvalidService,
            ErrorCode::BadPgt,
        ] {
            assert_eq!(code.status(), StatusClass::ClientFault, "{code}");
            assert_eq!(code.status().http_status(), 422);
        }
    }

    #[test]
    fn internal_and_unknown_are_server_faults() {
        assert_eq!(ErrorCode::InternalError.status().http_status(), 500);
        assert_eq!(status_for(""), StatusClass::ServerFault);
        assert_eq!(status_for("BAD_PGT_EXTRA"), StatusClass::ServerFault);
        assert_eq!(status_for("invalid_ticket"), StatusClass::ServerFault);
        assert_eq!(status_for("INVALID_PROXY_CALLBACK"), StatusClass::ClientFault);
    }

    #[test]
    fn ticket_errors_map_to_codes() {
        let t = || "ST-abc".to_string();
        assert_eq!(
            TicketError::NotFound { ticket: t() }.code(),
            ErrorCode::InvalidTicket
        );
        assert_eq!(TicketError::Malformed.code(), ErrorCode::InvalidTicket);
        assert_eq!(
            TicketError::Expired { ticket: t() }.code(),
            ErrorCode::InvalidTicket
        );
        assert_eq!(
            TicketError::AlreadyConsumed { ticket: t() }.code(),
            ErrorCode::InvalidTicket
        );
        assert_eq!(
            TicketError::ServiceMismatch { ticket: t() }.code(),
            ErrorCode::InvalidService
        );
        assert_eq!(
            TicketError::MissingParameter("service").code(),
            ErrorCode::InvalidRequest
        );
        assert_eq!(TicketError::BadPgt { ticket: t() }.code(), ErrorCode::BadPgt);
        assert_eq!(
            TicketError::Internal(StoreError::Closed).code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn replay_is_distinguishable_from_expiry() {
        let replay = TicketError::AlreadyConsumed {
            ticket: "ST-1".to_string(),
        };
        let expired = TicketError::Expired {
            ticket: "ST-1".to_string(),
        };

        assert_eq!(replay.code(), expired.code());
        assert!(replay.is_replay());
        assert!(!expired.is_replay());
    }

    #[test]
    fn internal_description_hides_cause() {
        let err = TicketError::Internal(StoreError::Backend("disk on fire".to_string()));
        assert!(!err.description().contains("disk"));
        assert!(err.to_string().contains("internal"));
    }
}
