use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::{GateError, Result};

static ROUTE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/[A-Za-z0-9/_\-.]*$").expect("route pattern is valid"));

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL
    pub fn validate_redis_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(GateError::Configuration("Redis URL cannot be empty".to_string()));
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(GateError::Configuration(
                "Redis URL must start with 'redis://' or 'rediss://'".to_string(),
            ));
        }

        Ok(())
    }

    /// The token secret must be present before the server accepts requests
    pub fn validate_secret(secret: Option<&str>) -> Result<()> {
        match secret {
            Some(s) if !s.trim().is_empty() => Ok(()),
            _ => Err(GateError::Configuration("JWT_SECRET must be set".to_string())),
        }
    }

    pub fn validate_timeout(name: &str, value: Duration) -> Result<()> {
        if value.is_zero() {
            return Err(GateError::Configuration(format!("{} must be greater than 0", name)));
        }

        Ok(())
    }

    /// Route identifiers are absolute paths
    pub fn validate_route(route: &str) -> Result<()> {
        if !ROUTE_PATTERN.is_match(route) {
            return Err(GateError::Configuration(format!(
                "Invalid route '{}': must be an absolute path",
                route
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_redis_url() {
        assert!(ConfigValidator::validate_redis_url("redis://localhost:6379").is_ok());
        assert!(ConfigValidator::validate_redis_url("rediss://localhost:6379").is_ok());
    }

    #[test]
    fn test_invalid_redis_url() {
        assert!(ConfigValidator::validate_redis_url("").is_err());
        assert!(ConfigValidator::validate_redis_url("http://localhost:6379").is_err());
    }

    #[test]
    fn test_secret() {
        assert!(ConfigValidator::validate_secret(Some("abc")).is_ok());
        assert!(ConfigValidator::validate_secret(Some("  ")).is_err());
        assert!(ConfigValidator::validate_secret(None).is_err());
    }

    #[test]
    fn test_timeout() {
        assert!(ConfigValidator::validate_timeout("t", Duration::from_millis(1)).is_ok());
        assert!(ConfigValidator::validate_timeout("t", Duration::ZERO).is_err());
    }

    #[test]
    fn test_routes() {
        assert!(ConfigValidator::validate_route("/goals/set").is_ok());
        assert!(ConfigValidator::validate_route("/log-calories").is_ok());
        assert!(ConfigValidator::validate_route("goals").is_err());
        assert!(ConfigValidator::validate_route("/goals set").is_err());
    }
}
