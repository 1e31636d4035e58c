use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::config_validator::ConfigValidator;
use crate::error::{GateError, Result};

/// Per-route quota configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePolicies {
    #[serde(default)]
    pub rules: HashMap<String, RouteRule>,
    /// Applied to gated routes without a rule of their own; `None` leaves them unlimited
    #[serde(default)]
    pub default_rule: Option<RouteRule>,
}

/// At most `limit` requests per identity within each `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RouteRule {
    pub limit: u32,
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "validate_window"))]
    pub window: Duration,
}

fn validate_window(window: &Duration) -> std::result::Result<(), ValidationError> {
    if window.is_zero() {
        return Err(ValidationError::new("window_must_be_positive"));
    }
    Ok(())
}

impl Default for RoutePolicies {
    fn default() -> Self {
        let per_minute = |limit| RouteRule {
            limit,
            window: Duration::from_secs(60),
        };

        let rules = HashMap::from([
            ("/log-calories".to_string(), per_minute(5)),
            ("/log-strength".to_string(), per_minute(5)),
            ("/goals/set".to_string(), per_minute(3)),
            ("/dashboard/weekly".to_string(), per_minute(30)),
        ]);

        Self {
            rules,
            default_rule: Some(per_minute(60)),
        }
    }
}

impl RoutePolicies {
    /// Load policies from a JSON file, e.g. `{"rules": {"/goals/set": {"limit": 3, "window": "1m"}}}`
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GateError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let policies: RoutePolicies = serde_json::from_str(raw)
            .map_err(|e| GateError::Configuration(format!("invalid route rules: {}", e)))?;
        policies.validate()?;
        Ok(policies)
    }

    /// Reject any rule with a zero window or a malformed route
    pub fn validate(&self) -> Result<()> {
        for (route, rule) in &self.rules {
            ConfigValidator::validate_route(route)?;
            rule.validate()
                .map_err(|e| GateError::Configuration(format!("rule for {}: {}", route, e)))?;
        }
        if let Some(rule) = &self.default_rule {
            rule.validate()
                .map_err(|e| GateError::Configuration(format!("default rule: {}", e)))?;
        }
        Ok(())
    }

    /// Get the rule for a route, falling back to the default
    pub fn rule_for(&self, route: &str) -> Option<&RouteRule> {
        self.rules.get(route).or(self.default_rule.as_ref())
    }

    pub fn set_rule(&mut self, route: String, rule: RouteRule) {
        self.rules.insert(route, rule);
    }
}

impl RouteRule {
    /// A zero window is a configuration error; a zero limit is legal and admits nothing
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        let rule = Self { limit, window };
        rule.validate()
            .map_err(|e| GateError::Configuration(format!("invalid rule: {}", e)))?;
        Ok(rule)
    }
}
