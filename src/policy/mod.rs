//! Policy Module
//!
//! Decides which requests go through the idempotency protocol and how long
//! their lock and cached response live.

mod route;


use std::time::Duration;

use crate::config::{IdempotencyConfig, DEFAULT_EXPIRE_TIME};
use crate::error::ConfigError;

pub use route::{normalize_path, RouteRule, RoutePattern};

// == Request Info ==
/// The parts of a request a policy looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestInfo<'a> {
    pub method: &'a str,
    pub path: &'a str,
}

impl<'a> RequestInfo<'a> {
    pub fn new(method: &'a str, path: &'a str) -> Self {
        Self { method, path }
    }
}

// == Policy Trait ==
pub trait Policy: Send + Sync {
    /// Whether the request is eligible for idempotent processing.
    fn should(&self, request: &RequestInfo<'_>) -> bool;

    /// TTL for the lock and cached response of this request.
    fn expire_time_for(&self, request: &RequestInfo<'_>) -> Duration;
}

// == Route Policy ==
/// Ordered route rules; the first rule matching method and path wins.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
    default_expire_time: Option<Duration>,
}

impl RoutePolicy {
    pub fn new(rules: Vec<RouteRule>, default_expire_time: Option<Duration>) -> Self {
        Self {
            rules,
            default_expire_time,
        }
    }

    pub fn from_config(config: &IdempotencyConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.route_rules()?,
            config.expire_time.map(Duration::from_secs),
        ))
    }

    pub fn matching_route(&self, request: &RequestInfo<'_>) -> Option<&RouteRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(request.method, request.path))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}

impl Policy for RoutePolicy {
    fn should(&self, request: &RequestInfo<'_>) -> bool {
        self.matching_route(request).is_some()
    }

    fn expire_time_for(&self, request: &RequestInfo<'_>) -> Duration {
        self.matching_route(request)
            .and_then(RouteRule::expire_time)
            .or(self.default_expire_time)
            .unwrap_or(Duration::from_secs(DEFAULT_EXPIRE_TIME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn policy() -> RoutePolicy {
        let config = IdempotencyConfig {
            expire_time: Some(3600),
            routes: vec![
                RouteConfig::new("/api/v1/test/*", "POST").with_expire_time(180),
                RouteConfig::new("/api/v2/test/*", "POST").with_expire_time(180),
                RouteConfig::new("/admin/v2/store/orders", "POST").with_expire_time(180),
            ],
            ..IdempotencyConfig::default()
        };
        RoutePolicy::from_config(&config).unwrap()
    }

    #[test]
    fn test_should_when_route_matches() {
        assert!(policy().should(&RequestInfo::new("POST", "/api/v1/test/123")));
    }

    #[test]
    fn test_should_with_trailing_slash() {
        assert!(policy().should(&RequestInfo::new("POST", "/admin/v2/store/orders/")));
    }

    #[test]
    fn test_should_not_when_path_differs() {
        assert!(!policy().should(&RequestInfo::new("POST", "/api/v1/other")));
    }

    #[test]
    fn test_should_not_when_method_differs() {
        assert!(!policy().should(&RequestInfo::new("GET", "/api/v1/test/123")));
    }

    #[test]
    fn test_should_not_without_routes() {
        let policy = RoutePolicy::default();
        assert!(!policy.should(&RequestInfo::new("POST", "/anything")));
    }

    #[test]
    fn test_expire_time_from_matched_route() {
        let policy = policy();
        assert_eq!(
            policy.expire_time_for(&RequestInfo::new("POST", "/api/v1/test/123")),
            Duration::from_secs(180)
        );
        assert_eq!(
            policy.expire_time_for(&RequestInfo::new("POST", "/admin/v2/store/orders/")),
            Duration::from_secs(180)
        );
    }

    #[test]
    fn test_expire_time_for_unmatched_route_is_default() {
        assert_eq!(
            policy().expire_time_for(&RequestInfo::new("POST", "/api/v1/other")),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_expire_time_layering() {
        let rules = vec![RouteRule::new("/orders", "POST", None).unwrap()];
        let request = RequestInfo::new("POST", "/orders");

        let with_default = RoutePolicy::new(rules.clone(), Some(Duration::from_secs(60)));
        assert_eq!(with_default.expire_time_for(&request), Duration::from_secs(60));

        let without_default = RoutePolicy::new(rules, None);
        assert_eq!(without_default.expire_time_for(&request), Duration::from_secs(3600));
    }

    #[test]
    fn test_first_match_wins() {
        let policy = RoutePolicy::new(
            vec![
                RouteRule::new("/orders/*", "POST", Some(Duration::from_secs(10))).unwrap(),
                RouteRule::new("/orders/special", "POST", Some(Duration::from_secs(99))).unwrap(),
            ],
            None,
        );
        let request = RequestInfo::new("POST", "/orders/special");

        assert_eq!(policy.matching_route(&request).unwrap().path(), "/orders/*");
        assert_eq!(policy.expire_time_for(&request), Duration::from_secs(10));
    }
}
