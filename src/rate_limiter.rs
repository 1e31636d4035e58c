use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::Identity;
use crate::error::{GateError, Result};
use crate::keys::QuotaKey;
use crate::rate_limit_config::RouteRule;
use crate::store::{bounded, KeyTtl, QuotaStore};

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit { count: u64, remaining: u64 },
    Reject { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }

    /// Retry-after rounded up to whole seconds, zero for admitted requests
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Decision::Admit { .. } => 0,
            Decision::Reject { retry_after } => {
                retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)
            }
        }
    }
}

/// Fixed-window counter limiter backed by a shared quota store.
///
/// Each (identity, route) pair owns one counter. The first request of a window
/// creates it through `INCR` and arms its expiry; the store deletes it when the
/// window ends. Store failures fail closed.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn QuotaStore>,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn QuotaStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn allow(&self, identity: &Identity, route: &str, rule: &RouteRule) -> Result<Decision> {
        if rule.limit == 0 {
            debug!(route, "route admits no requests");
            return Ok(Decision::Reject {
                retry_after: rule.window,
            });
        }

        let key = QuotaKey::new(identity, route).to_string();

        let count = bounded(self.timeout, self.store.incr(&key))
            .await
            .map_err(|e| {
                warn!(route, error = %e, "quota increment failed, rejecting");
                GateError::from(e)
            })?;

        if count == 1 {
            // A crash before this call leaves the counter without expiry
            bounded(self.timeout, self.store.expire(&key, rule.window))
                .await
                .map_err(|e| {
                    warn!(route, error = %e, "failed to arm quota window, rejecting");
                    GateError::from(e)
                })?;
        }

        let count = count.max(0) as u64;
        let limit = u64::from(rule.limit);

        if count > limit {
            let retry_after = self.remaining_window(&key, rule).await;
            debug!(route, count, limit, retry_after_ms = retry_after.as_millis() as u64, "quota exceeded");
            return Ok(Decision::Reject { retry_after });
        }

        Ok(Decision::Admit {
            count,
            remaining: limit - count,
        })
    }

    async fn remaining_window(&self, key: &str, rule: &RouteRule) -> Duration {
        match bounded(self.timeout, self.store.ttl(key)).await {
            Ok(KeyTtl::Expires(remaining)) => remaining,
            Ok(KeyTtl::Missing) => Duration::ZERO,
            Ok(KeyTtl::Persistent) => {
                warn!(key, "quota counter has no expiry and needs manual removal");
                rule.window
            }
            Err(e) => {
                warn!(key, error = %e, "could not read quota ttl, reporting full window");
                rule.window
            }
        }
    }
}
