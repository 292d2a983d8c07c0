//! Route Rules
//!
//! Path patterns and the method/TTL attached to them.

use std::time::Duration;

use regex::Regex;

use crate::config::RouteConfig;
use crate::error::{ConfigError, RouteError};

/// Strips one trailing slash, so `/orders/` and `/orders` compare equal.
pub fn normalize_path(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

// == Route Pattern ==
#[derive(Debug, Clone)]
pub enum RoutePattern {
    /// Compared byte for byte after normalization
    Exact(String),
    /// Anchored regex where each `*` matches one run of non-`/` characters
    Wildcard(Regex),
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        let normalized = normalize_path(pattern);
        if !normalized.contains('*') {
            return Ok(RoutePattern::Exact(normalized.to_string()));
        }

        let body = normalized
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("[^/]*");
        Regex::new(&format!("^{body}$")).map(RoutePattern::Wildcard)
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        match self {
            RoutePattern::Exact(expected) => expected == path,
            RoutePattern::Wildcard(regex) => regex.is_match(path),
        }
    }
}

// == Route Rule ==
/// A compiled entry of the `routes` list.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pattern: RoutePattern,
    source: String,
    method: String,
    expire_time: Option<Duration>,
}

impl RouteRule {
    /// Compiles a rule. The path must be absolute and the method an
    /// upper-case token; request methods are compared to it exactly.
    pub fn new(
        path: &str,
        method: &str,
        expire_time: Option<Duration>,
    ) -> Result<Self, RouteError> {
        if path.trim().is_empty() {
            return Err(RouteError::EmptyPath);
        }
        if !path.starts_with('/') {
            return Err(RouteError::RelativePath(path.to_string()));
        }
        if method.trim().is_empty() {
            return Err(RouteError::EmptyMethod);
        }
        if !method.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(RouteError::InvalidMethod(method.to_string()));
        }
        let pattern = RoutePattern::parse(path)?;

        Ok(Self {
            pattern,
            source: path.to_string(),
            method: method.to_string(),
            expire_time,
        })
    }

    pub fn from_config(index: usize, route: &RouteConfig) -> Result<Self, ConfigError> {
        Self::new(
            &route.path,
            &route.http_method,
            route.expire_time.map(Duration::from_secs),
        )
        .map_err(|reason| ConfigError::InvalidRoute { index, reason })
    }

    /// Method must be equal; path must match the pattern.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.method == method && self.pattern.matches(path)
    }

    /// The pattern as configured.
    pub fn path(&self) -> &str {
        &self.source
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn expire_time(&self) -> Option<Duration> {
        self.expire_time
    }
}
