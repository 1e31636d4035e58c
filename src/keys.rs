//! Store key generation for quota counters and cached aggregations.
//!
//! Keys are `prefix:component:component`. Components are escaped so that a
//! `:` inside an identity or route can never shift the boundary between them,
//! which keeps the mapping from (identity, route) to key injective.

use std::fmt;

use crate::auth::Identity;

const QUOTA_PREFIX: &str = "rate";
const CACHE_PREFIX: &str = "weekly";

/// Identifies one fixed-window counter: one identity on one route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotaKey {
    identity: String,
    route: String,
}

impl QuotaKey {
    pub fn new(identity: &Identity, route: &str) -> Self {
        Self {
            identity: identity.as_str().to_string(),
            route: route.to_string(),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

impl fmt::Display for QuotaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            QUOTA_PREFIX,
            escape_component(&self.identity),
            escape_component(&self.route)
        )
    }
}

/// Identifies one cached aggregation: one identity over one period.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    identity: String,
    period: String,
}

impl CacheKey {
    pub fn new(identity: &Identity, period: &str) -> Self {
        Self {
            identity: identity.as_str().to_string(),
            period: period.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            CACHE_PREFIX,
            escape_component(&self.identity),
            escape_component(&self.period)
        )
    }
}

/// Percent-escape the separator and the escape character itself.
pub fn escape_component(component: &str) -> String {
    let mut escaped = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            _ => escaped.push(c),
        }
    }
    escaped
}
