//! Engine configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! [tickets]
//! service_ticket_ttl_secs = 120
//!
//! [services]
//! strip_params = ["utm_source"]
//!
//! [[services.registered]]
//! pattern = "https://intranet.example/*"
//! match_mode = "pattern"
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML for this schema.
    #[error("failed to parse config: {message}")]
    Parse {
        /// Parser message
        message: String,
    },

    /// A value is out of range.
    #[error("invalid config value '{field}': {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CasConfig {
    /// Ticket lifetimes and limits
    #[serde(default)]
    pub tickets: TicketConfig,

    /// Service URL handling
    #[serde(default)]
    pub services: ServiceConfig,
}

impl CasConfig {
    /// Reads and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses and validates a configuration document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lifetimes = [
            ("tickets.login_ticket_ttl_secs", self.tickets.login_ticket_ttl_secs),
            ("tickets.service_ticket_ttl_secs", self.tickets.service_ticket_ttl_secs),
            ("tickets.proxy_ticket_ttl_secs", self.tickets.proxy_ticket_ttl_secs),
            ("tickets.session_ttl_secs", self.tickets.session_ttl_secs),
        ];
        for (field, secs) in lifetimes {
            if secs <= 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("lifetime must be positive, got {secs}"),
                });
            }
            if secs > MAX_TTL_SECS {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("lifetime must be at most {MAX_TTL_SECS}, got {secs}"),
                });
            }
        }

        // Shorter than any generated value
        if self.tickets.max_ticket_len < 72 {
            return Err(ConfigError::Invalid {
                field: "tickets.max_ticket_len",
                reason: format!("must be at least 72, got {}", self.tickets.max_ticket_len),
            });
        }

        for rule in &self.services.registered {
            if rule.pattern.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "services.registered.pattern",
                    reason: "pattern must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Longest accepted ticket lifetime: ten years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Ticket lifetimes and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketConfig {
    /// Lifetime of an unused login ticket
    #[serde(default = "default_login_ticket_ttl")]
    pub login_ticket_ttl_secs: i64,

    /// Lifetime of an unused service ticket
    #[serde(default = "default_service_ticket_ttl")]
    pub service_ticket_ttl_secs: i64,

    /// Lifetime of an unused proxy ticket
    #[serde(default = "default_proxy_ticket_ttl")]
    pub proxy_ticket_ttl_secs: i64,

    /// Maximum session (ticket-granting ticket) lifetime
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,

    /// Longest ticket value accepted from callers
    #[serde(default = "default_max_ticket_len")]
    pub max_ticket_len: usize,
}

impl TicketConfig {
    /// Login ticket lifetime, or `None` if it does not fit a `Duration`.
    pub fn login_ticket_ttl(&self) -> Option<Duration> {
        Duration::try_seconds(self.login_ticket_ttl_secs)
    }

    /// Service ticket lifetime, or `None` if it does not fit a `Duration`.
    pub fn service_ticket_ttl(&self) -> Option<Duration> {
        Duration::try_seconds(self.service_ticket_ttl_secs)
    }

    /// Proxy ticket lifetime, or `None` if it does not fit a `Duration`.
    pub fn proxy_ticket_ttl(&self) -> Option<Duration> {
        Duration::try_seconds(self.proxy_ticket_ttl_secs)
    }

    /// Session lifetime, or `None` if it does not fit a `Duration`.
    pub fn session_ttl(&self) -> Option<Duration> {
        Duration::try_seconds(self.session_ttl_secs)
    }
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            login_ticket_ttl_secs: default_login_ticket_ttl(),
            service_ticket_ttl_secs: default_service_ticket_ttl(),
            proxy_ticket_ttl_secs: default_proxy_ticket_ttl(),
            session_ttl_secs: default_session_ttl(),
            max_ticket_len: default_max_ticket_len(),
        }
    }
}

fn default_login_ticket_ttl() -> i64 {
    300
}

fn default_service_ticket_ttl() -> i64 {
    300
}

fn default_proxy_ticket_ttl() -> i64 {
    300
}

fn default_session_ttl() -> i64 {
    172_800
}

fn default_max_ticket_len() -> usize {
    256
}

/// Service URL handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Query parameters stripped from every service URL before comparison.
    /// `ticket` is always stripped.
    #[serde(default)]
    pub strip_params: Vec<String>,

    /// Reject proxy callback URLs that are not `https`
    #[serde(default = "default_true")]
    pub require_https_callback: bool,

    /// Per-service rules
    #[serde(default)]
    pub registered: Vec<ServiceRule>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            strip_params: Vec::new(),
            require_https_callback: true,
            registered: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// How a registered service compares URLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Exact string match after normalization
    #[default]
    Exact,
    /// Any two URLs matching the rule's pattern are considered the same service
    Pattern,
}

/// A registered relying service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRule {
    /// Exact URL, or a glob where `*` matches any run of characters
    pub pattern: String,

    /// Extra query parameters stripped for this service
    #[serde(default)]
    pub strip_params: Vec<String>,

    /// Comparison mode
    #[serde(default)]
    pub match_mode: MatchMode,
}
