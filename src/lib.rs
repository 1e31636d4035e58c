pub mod auth;
pub mod cache;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod health;
pub mod keys;
pub mod ledger;
pub mod metrics;
pub mod middleware;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod store;
pub mod summary;
pub mod validation;

pub use auth::{AuthError, Identity, Verifier};
pub use cache::{AggregationCache, CacheStatus, Fetched};
pub use config::Config;
pub use error::{GateError, Result};
pub use gate::{Caller, Gate};
pub use rate_limiter::{Decision, RateLimiter};
pub use server::{build_state, create_app};
