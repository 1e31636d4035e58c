use clap::{Parser, ValueEnum};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config_validator::ConfigValidator;
use crate::error::Result;
use crate::rate_limit_config::RoutePolicies;

/// Backing store for quota counters and cached summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Redis,
    /// Process-local, for development only: quotas are not shared between instances
    Memory,
}

#[derive(Clone, Parser)]
#[command(name = "fitgate", version, about = "Identity-scoped request gate for the fitness API")]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_addr: SocketAddr,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    #[arg(long, env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::Redis)]
    pub store_backend: StoreBackend,

    /// HMAC secret used to verify bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Clock skew tolerated when checking token expiry
    #[arg(long, env = "JWT_LEEWAY_SECS", default_value_t = 0)]
    pub jwt_leeway_secs: u64,

    /// Upper bound on every store round-trip
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 250)]
    pub store_timeout_ms: u64,

    #[arg(long, env = "WEEKLY_CACHE_TTL_SECS", default_value_t = 300)]
    pub weekly_cache_ttl_secs: u64,

    /// JSON file with per-route quota rules; built-in defaults otherwise
    #[arg(long, env = "ROUTE_RULES_FILE")]
    pub route_rules_file: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("redis_url", &self.redis_url)
            .field("store_backend", &self.store_backend)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("weekly_cache_ttl_secs", &self.weekly_cache_ttl_secs)
            .field("route_rules_file", &self.route_rules_file)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from command line arguments and environment variables
    pub fn from_env() -> Self {
        Config::parse()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn weekly_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.weekly_cache_ttl_secs)
    }

    /// Route rules from `route_rules_file`, or the built-in defaults
    pub fn route_policies(&self) -> Result<RoutePolicies> {
        match &self.route_rules_file {
            Some(path) => RoutePolicies::from_file(path),
            None => Ok(RoutePolicies::default()),
        }
    }

    /// Catch misconfiguration at startup rather than on the first request
    pub fn validate(&self) -> Result<()> {
        ConfigValidator::validate_secret(self.jwt_secret.as_deref())?;
        ConfigValidator::validate_timeout("store timeout", self.store_timeout())?;
        ConfigValidator::validate_timeout("weekly cache ttl", self.weekly_cache_ttl())?;
        if self.store_backend == StoreBackend::Redis {
            ConfigValidator::validate_redis_url(&self.redis_url)?;
        }
        self.route_policies()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["fitgate"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_explicit_arguments() {
        let config = parse(&[
            "--bind-addr",
            "0.0.0.0:9000",
            "--jwt-secret",
            "s3cret",
            "--store-backend",
            "memory",
            "--store-timeout-ms",
            "100",
        ]);

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.store_timeout(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_secret_fails_validation() {
        let mut config = parse(&["--jwt-secret", "x"]);
        config.jwt_secret = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let config = parse(&["--jwt-secret", "x", "--store-timeout-ms", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = parse(&["--jwt-secret", "do-not-print"]);
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("do-not-print"));
        assert!(rendered.contains("<redacted>"));
    }
}
