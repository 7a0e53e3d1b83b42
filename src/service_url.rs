//! Service URL normalization and matching.
//!
//! A service URL is compared exactly, after stripping the `ticket` query
//! parameter and any other parameters configured globally or for the
//! matching registered service. Pattern matching only happens for services
//! registered with [`MatchMode::Pattern`].

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use url::Url;

use crate::config::{ConfigError, MatchMode, ServiceConfig, ServiceRule};
use crate::error::TicketError;

/// Query parameter carrying the ticket on redirects. Always stripped.
pub const TICKET_PARAM: &str = "ticket";

/// Per-service configuration lookup.
pub trait ServiceRegistry: Send + Sync {
    /// Returns the rule governing `service`, if it is registered.
    fn rule_for(&self, service: &str) -> Option<&RegisteredService>;
}

/// A [`ServiceRule`] with its pattern compiled.
#[derive(Debug, Clone)]
pub struct RegisteredService {
    rule: ServiceRule,
    matcher: Regex,
}

impl RegisteredService {
    /// Compiles a rule. `*` in the pattern matches any run of characters.
    pub fn compile(rule: ServiceRule) -> Result<Self, ConfigError> {
        let source = format!("^{}$", regex::escape(&rule.pattern).replace(r"\*", ".*"));
        let matcher = Regex::new(&source).map_err(|e| ConfigError::Invalid {
            field: "services.registered.pattern",
            reason: e.to_string(),
        })?;
        Ok(Self { rule, matcher })
    }

    /// Returns true if `service` falls under this rule.
    pub fn covers(&self, service: &str) -> bool {
        self.matcher.is_match(service)
    }

    /// Returns the comparison mode.
    pub fn match_mode(&self) -> MatchMode {
        self.rule.match_mode
    }

    /// Returns the extra parameters stripped for this service.
    pub fn strip_params(&self) -> &[String] {
        &self.rule.strip_params
    }
}

/// Registry backed by a fixed list of rules. First match wins.
#[derive(Debug, Clone, Default)]
pub struct StaticServiceRegistry {
    services: Vec<RegisteredService>,
}

impl StaticServiceRegistry {
    /// Compiles every rule.
    pub fn from_rules(rules: &[ServiceRule]) -> Result<Self, ConfigError> {
        let services = rules
            .iter()
            .cloned()
            .map(RegisteredService::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { services })
    }

    /// Returns the number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceRegistry for StaticServiceRegistry {
    fn rule_for(&self, service: &str) -> Option<&RegisteredService> {
        self.services.iter().find(|s| s.covers(service))
    }
}

/// Normalizes and compares service URLs.
///
/// # Examples
///
/// ```
/// use cas_core::ServiceMatcher;
///
/// let matcher = ServiceMatcher::exact();
/// let normalized = matcher
///     .normalize("https://a.example/cb?x=1&ticket=ST-123")
///     .unwrap();
/// assert_eq!(normalized, "https://a.example/cb?x=1");
///
/// assert!(!matcher.matches("https://a.example/cb?x=1", "https://a.example/cb?x=2"));
/// ```
#[derive(Clone)]
pub struct ServiceMatcher {
    strip: Vec<String>,
    registry: Option<Arc<dyn ServiceRegistry>>,
}

impl std::fmt::Debug for ServiceMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMatcher")
            .field("strip", &self.strip)
            .field("registry", &self.registry.is_some())
            .finish()
    }
}

impl ServiceMatcher {
    /// Exact matching with only `ticket` stripped and no registry.
    pub fn exact() -> Self {
        Self {
            strip: Vec::new(),
            registry: None,
        }
    }

    /// Builds a matcher from configuration, compiling the registered services.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let registry = if config.registered.is_empty() {
            None
        } else {
            let registry: Arc<dyn ServiceRegistry> =
                Arc::new(StaticServiceRegistry::from_rules(&config.registered)?);
            Some(registry)
        };
        Ok(Self {
            strip: config.strip_params.clone(),
            registry,
        })
    }

    /// Replaces the registry with an external one.
    pub fn with_registry(mut self, registry: Arc<dyn ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds globally stripped parameters.
    pub fn with_strip_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strip.extend(params.into_iter().map(Into::into));
        self
    }

    /// Normalizes a service URL for storage and comparison.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` if the value is empty or not an absolute URL.
    pub fn normalize(&self, service: &str) -> Result<String, TicketError> {
        let service = service.trim();
        if service.is_empty() {
            return Err(TicketError::MissingParameter("service"));
        }
        let url = Url::parse(service).map_err(|e| TicketError::InvalidParameter {
            name: "service",
            reason: e.to_string(),
        })?;

        let without_ticket = strip_query(url, &HashSet::from([TICKET_PARAM]));

        let mut strip: HashSet<&str> = self.strip.iter().map(String::as_str).collect();
        if let Some(rule) = self.rule_for(without_ticket.as_str()) {
            strip.extend(rule.strip_params().iter().map(String::as_str));
        }
        if strip.is_empty() {
            return Ok(without_ticket.into());
        }
        Ok(strip_query(without_ticket, &strip).into())
    }

    /// Compares an already-normalized issued service with an already-normalized
    /// presented service.
    pub fn matches(&self, issued: &str, presented: &str) -> bool {
        if issued == presented {
            return true;
        }
        match self.rule_for(issued) {
            Some(rule) if rule.match_mode() == MatchMode::Pattern => rule.covers(presented),
            _ => false,
        }
    }

    fn rule_for(&self, service: &str) -> Option<&RegisteredService> {
        self.registry.as_deref().and_then(|r| r.rule_for(service))
    }
}

impl Default for ServiceMatcher {
    fn default() -> Self {
        Self::exact()
    }
}

fn strip_query(mut url: Url, strip: &HashSet<&str>) -> Url {
    if url.query().is_none() {
        return url;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !strip.contains(&k[..]))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

/// Appends (or replaces) the `ticket` parameter on a service URL.
///
/// # Errors
///
/// Returns `INVALID_REQUEST` if `service` is not an absolute URL.
pub fn service_url_with_ticket(service: &str, ticket: &str) -> Result<String, TicketError> {
    let url = Url::parse(service).map_err(|e| TicketError::InvalidParameter {
        name: "service",
        reason: e.to_string(),
    })?;
    let mut url = strip_query(url, &HashSet::from([TICKET_PARAM]));
    url.query_pairs_mut().append_pair(TICKET_PARAM, ticket);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, mode: MatchMode, strip: &[&str]) -> ServiceRule {
        ServiceRule {
            pattern: pattern.to_string(),
            strip_params: strip.iter().map(|s| s.to_string()).collect(),
            match_mode: mode,
        }
    }

    #[test]
    fn strips_ticket_param() {
        let m = ServiceMatcher::exact();
        assert_eq!(
            m.normalize("https://svc1/?ticket=ST-1").unwrap(),
            "https://svc1/"
        );
        assert_eq!(
            m.normalize("https://svc1/app?a=1&ticket=ST-1&b=2").unwrap(),
            "https://svc1/app?a=1&b=2"
        );
    }

    #[test]
    fn host_only_urls_gain_trailing_slash() {
        let m = ServiceMatcher::exact();
        assert_eq!(m.normalize("https://svc1").unwrap(), "https://svc1/");
    }

    #[test]
    fn rejects_missing_and_relative() {
        let m = ServiceMatcher::exact();
        assert_eq!(
            m.normalize("  ").unwrap_err(),
            TicketError::MissingParameter("service")
        );
        assert!(matches!(
            m.normalize("/relative/path").unwrap_err(),
            TicketError::InvalidParameter { name: "service", .. }
        ));
    }

    #[test]
    fn exact_match_is_strict() {
        let m = ServiceMatcher::exact();
        let issued = m.normalize("https://a.example/cb?x=1").unwrap();
        let presented = m.normalize("https://a.example/cb?x=2").unwrap();
        assert!(!m.matches(&issued, &presented));
        assert!(!m.matches("https://a.example/cb", "https://a.example/cb/extra"));
    }

    #[test]
    fn global_strip_params() {
        let m = ServiceMatcher::exact().with_strip_params(["x"]);
        let issued = m.normalize("https://a.example/cb?x=1").unwrap();
        let presented = m.normalize("https://a.example/cb?x=2").unwrap();
        assert_eq!(issued, "https://a.example/cb");
        assert!(m.matches(&issued, &presented));
    }

    #[test]
    fn per_service_strip_params() {
        let config = ServiceConfig {
            registered: vec![rule("https://a.example/*", MatchMode::Exact, &["x"])],
            ..ServiceConfig::default()
        };
        let m = ServiceMatcher::from_config(&config).unwrap();

        assert_eq!(
            m.normalize("https://a.example/cb?x=1&y=2").unwrap(),
            "https://a.example/cb?y=2"
        );
        // Other services keep x
        assert_eq!(
            m.normalize("https://b.example/cb?x=1").unwrap(),
            "https://b.example/cb?x=1"
        );
    }

    #[test]
    fn pattern_mode_only_when_registered() {
        let config = ServiceConfig {
            registered: vec![rule("https://intranet.example/*", MatchMode::Pattern, &[])],
            ..ServiceConfig::default()
        };
        let m = ServiceMatcher::from_config(&config).unwrap();

        assert!(m.matches(
            "https://intranet.example/wiki",
            "https://intranet.example/mail"
        ));
        assert!(!m.matches(
            "https://intranet.example/wiki",
            "https://evil.example/intranet.example/"
        ));
        assert!(!m.matches("https://other.example/a", "https://other.example/b"));
    }

    #[test]
    fn glob_escapes_regex_metacharacters() {
        let svc = RegisteredService::compile(rule(
            "https://a.example/app?id=*",
            MatchMode::Pattern,
            &[],
        ))
        .unwrap();
        assert!(svc.covers("https://a.example/app?id=42"));
        assert!(!svc.covers("https://aXexample/app?id=42"));
    }

    #[test]
    fn ticket_redirect_url() {
        assert_eq!(
            service_url_with_ticket("https://svc1/", "ST-1").unwrap(),
            "https://svc1/?ticket=ST-1"
        );
        assert_eq!(
            service_url_with_ticket("https://svc1/app?a=1&ticket=ST-old", "ST-2").unwrap(),
            "https://svc1/app?a=1&ticket=ST-2"
        );
    }

    #[test]
    fn registry_lookup() {
        let registry = StaticServiceRegistry::from_rules(&[
            rule("https://a.example/", MatchMode::Exact, &[]),
            rule("https://b.example/*", MatchMode::Pattern, &[]),
        ])
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.rule_for("https://a.example/").is_some());
        assert!(registry.rule_for("https://a.example/x").is_none());
        assert_eq!(
            registry.rule_for("https://b.example/x").map(|r| r.match_mode()),
            Some(MatchMode::Pattern)
        );
    }
}
