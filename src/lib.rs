//! Ticket engine for a Central Authentication Service (CAS) login server.
//!
//! This crate implements the ticket lifecycle behind single sign-on:
//! - **Login tickets**: one anti-replay token per login form render
//! - **Ticket-granting tickets**: authenticated sessions, root of every chain
//! - **Service tickets**: single-use proof of identity for one service
//! - **Proxy-granting and proxy tickets**: delegated access through chains
//!   of services
//!
//! All ticket state lives in one injected [`TicketStore`]. Single-use
//! tickets are consumed with an atomic check-and-set, and logging out
//! destroys a session together with every ticket chained beneath it in one
//! store transaction.
//!
//! # Core Types
//!
//! - [`CasEngine`]: the public operations, built over a store and a clock
//! - [`Ticket`] and [`TicketKind`]: the closed set of ticket kinds
//! - [`TicketError`] and [`ErrorCode`]: typed failures and protocol codes
//! - [`status_for`]: total mapping from a code to a fault class
//! - [`web::CasFlows`]: the login, logout, and validation endpoints
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use cas_core::{CasEngine, ErrorCode, MemoryTicketStore, Secret, ValidationRequest};
//!
//! // Secrets are redacted in logs and debug output
//! let password = Secret::new("wonderland".to_string());
//! assert_eq!(format!("{:?}", password), "[REDACTED]");
//!
//! let engine = CasEngine::builder(Arc::new(MemoryTicketStore::open()))
//!     .build()
//!     .expect("default configuration is valid");
//!
//! let tgt = engine.create_tgt("alice", Default::default()).unwrap();
//! let st = engine
//!     .issue_service_ticket(tgt.id().as_str(), "https://a.example/cb?x=1", false)
//!     .unwrap();
//!
//! // Service URLs are compared exactly after normalization
//! let err = engine
//!     .validate_service_ticket(&ValidationRequest::new("https://a.example/cb?x=2", st.id().as_str()))
//!     .unwrap_err();
//! assert_eq!(err.code(), ErrorCode::InvalidService);
//! assert_eq!(err.status().http_status(), 422);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
mod callback;
mod clock;
mod config;
mod context;
mod credentials;
mod engine;
mod error;
mod granting;
mod logging;
mod login;
mod proxy;
mod secret;
mod service;
mod service_url;
mod store;
mod ticket;
pub mod web;

pub use callback::{CallbackError, Delivery, ProxyCallback, RecordingCallback};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CasConfig, ConfigError, MatchMode, ServiceConfig, ServiceRule, TicketConfig, MAX_TTL_SECS,
};
pub use credentials::{AuthenticationError, CredentialVerifier, Principal, StaticCredentials};
pub use engine::{CasEngine, CasEngineBuilder, ValidationRequest, ValidationSuccess};
pub use error::{status_for, ErrorCode, StatusClass, StoreError, TicketError};
pub use granting::TicketGrantingTickets;
pub use logging::RequestLog;
pub use login::LoginTickets;
pub use proxy::{ProxyGrantingTickets, ProxyTickets, ProxyValidation};
pub use secret::Secret;
pub use service::ServiceTickets;
pub use service_url::{
    service_url_with_ticket, RegisteredService, ServiceMatcher, ServiceRegistry,
    StaticServiceRegistry, TICKET_PARAM,
};
pub use store::{CascadeReport, ConsumeOutcome, MemoryTicketStore, TicketStore};
pub use ticket::{Attributes, Ticket, TicketBody, TicketId, TicketKind};
