use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{Identity, Verifier};
use crate::cache::{AggregationCache, Fetched};
use crate::error::{GateError, Result};
use crate::metrics::{GateOutcome, MetricsCollector};
use crate::rate_limit_config::RoutePolicies;
use crate::rate_limiter::{Decision, RateLimiter};

/// Caller that passed verification and its quota check on one route.
///
/// Built only by [`Gate::admit`], so holding one is proof of admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    identity: Identity,
    route: String,
}

impl Caller {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

/// Verifier, limiter and cache composed in request order.
#[derive(Clone)]
pub struct Gate {
    verifier: Verifier,
    limiter: RateLimiter,
    cache: AggregationCache,
    policies: Arc<RoutePolicies>,
    metrics: MetricsCollector,
}

impl Gate {
    pub fn new(
        verifier: Verifier,
        limiter: RateLimiter,
        cache: AggregationCache,
        policies: RoutePolicies,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            verifier,
            limiter,
            cache,
            policies: Arc::new(policies),
            metrics,
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Verify the credential, then spend one unit of the route's quota.
    pub async fn admit(&self, auth_header: Option<&str>, route: &str) -> Result<Caller> {
        let identity = match self.verifier.verify(auth_header.unwrap_or_default()) {
            Ok(identity) => identity,
            Err(e) => {
                debug!(route, error = %e, "credential rejected");
                self.metrics.record_outcome(route, GateOutcome::Unauthenticated).await;
                return Err(e.into());
            }
        };

        if let Some(rule) = self.policies.rule_for(route) {
            match self.limiter.allow(&identity, route, rule).await {
                Ok(Decision::Admit { remaining, .. }) => {
                    debug!(route, remaining, "request admitted");
                }
                Ok(decision @ Decision::Reject { .. }) => {
                    let retry_after_secs = decision.retry_after_secs();
                    info!(route, retry_after_secs, "request throttled");
                    self.metrics.record_outcome(route, GateOutcome::Throttled).await;
                    return Err(GateError::QuotaExceeded { retry_after_secs });
                }
                Err(e) => {
                    self.metrics.record_outcome(route, GateOutcome::StoreFailure).await;
                    return Err(e);
                }
            }
        }

        self.metrics.record_outcome(route, GateOutcome::Admitted).await;
        Ok(Caller {
            identity,
            route: route.to_string(),
        })
    }

    /// Serve a cacheable aggregation for an admitted caller.
    pub async fn cached<T, F, Fut>(&self, caller: &Caller, period: &str, compute: F) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let fetched = self.cache.fetch(&caller.identity, period, compute).await?;
        self.metrics.record_cache(&caller.route, fetched.status).await;
        Ok(fetched)
    }

    /// Admit, then run a protected operation. Its errors propagate unchanged.
    pub async fn run<T, F, Fut>(&self, auth_header: Option<&str>, route: &str, operation: F) -> Result<T>
    where
        F: FnOnce(Caller) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let caller = self.admit(auth_header, route).await?;
        operation(caller).await
    }

    /// Admit, then serve `compute` through the aggregation cache.
    pub async fn run_cached<T, F, Fut>(
        &self,
        auth_header: Option<&str>,
        route: &str,
        period: &str,
        compute: F,
    ) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Caller) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let caller = self.admit(auth_header, route).await?;
        let for_compute = caller.clone();
        self.cached(&caller, period, move || compute(for_compute)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::cache::CacheStatus;
    use crate::rate_limit_config::RouteRule;
    use crate::store::MemoryStore;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    const SECRET: &str = "gate-secret";

    fn gate(store: &MemoryStore) -> Gate {
        let timeout = Duration::from_millis(250);
        let mut policies = RoutePolicies {
            rules: Default::default(),
            default_rule: None,
        };
        policies.set_rule("/x".into(), RouteRule::new(2, Duration::from_secs(60)).unwrap());
        policies.set_rule("/weekly".into(), RouteRule::new(10, Duration::from_secs(60)).unwrap());

        Gate::new(
            Verifier::new(Some(SECRET), 0),
            RateLimiter::new(Arc::new(store.clone()), timeout),
            AggregationCache::new(Arc::new(store.clone()), Duration::from_secs(300), timeout),
            policies,
            MetricsCollector::new(),
        )
    }

    fn bearer(email: &str) -> String {
        let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
        let token = encode(
            &Header::default(),
            &json!({ "email": email, "exp": exp }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn test_malformed_header_never_touches_store() {
        let store = MemoryStore::new();
        let gate = gate(&store);

        let result = gate.admit(Some("Token abc"), "/x").await;
        assert!(matches!(result, Err(GateError::Auth(AuthError::MalformedHeader))));

        let result = gate.admit(None, "/x").await;
        assert!(matches!(result, Err(GateError::Auth(AuthError::MalformedHeader))));
        assert_eq!(store.operations(), 0);
    }

    #[tokio::test]
    async fn test_operation_runs_only_when_admitted() {
        let store = MemoryStore::new();
        let gate = gate(&store);
        let header = bearer("u1@example.com");
        let counter = AtomicUsize::new(0);
        let runs = &counter;

        for _ in 0..3 {
            let _ = gate
                .run(Some(&header), "/x", |caller| async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(caller)
                })
                .await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        let metrics = gate.metrics().route_metrics("/x").await.unwrap();
        assert_eq!(metrics.admitted_requests, 2);
        assert_eq!(metrics.throttled_requests, 1);
    }

    #[tokio::test]
    async fn test_caller_carries_identity_and_route() {
        let store = MemoryStore::new();
        let gate = gate(&store);

        let caller = gate.admit(Some(&bearer("u1@example.com")), "/x").await.unwrap();
        assert_eq!(caller.identity().as_str(), "u1@example.com");
        assert_eq!(caller.route(), "/x");
    }

    #[tokio::test]
    async fn test_route_without_rule_is_not_counted() {
        let store = MemoryStore::new();
        let gate = gate(&store);
        let header = bearer("u1@example.com");

        for _ in 0..10 {
            assert!(gate.admit(Some(&header), "/unlimited").await.is_ok());
        }
        assert_eq!(store.operations(), 0);
    }

    #[tokio::test]
    async fn test_operation_error_propagates_unchanged() {
        let store = MemoryStore::new();
        let gate = gate(&store);

        let result: Result<()> = gate
            .run(Some(&bearer("u1@example.com")), "/x", |_| async {
                Err(GateError::InvalidRequest("bad date".into()))
            })
            .await;
        assert!(matches!(result, Err(GateError::InvalidRequest(msg)) if msg == "bad date"));
    }

    #[tokio::test]
    async fn test_cached_route_computes_once() {
        let store = MemoryStore::new();
        let gate = gate(&store);
        let header = bearer("u1@example.com");
        let counter = AtomicUsize::new(0);
        let computations = &counter;

        let mut statuses = Vec::new();
        for _ in 0..2 {
            let fetched = gate
                .run_cached(Some(&header), "/weekly", "2024-W01", |caller| async move {
                    computations.fetch_add(1, Ordering::SeqCst);
                    Ok(caller.identity().as_str().to_string())
                })
                .await
                .unwrap();
            assert_eq!(fetched.value, "u1@example.com");
            statuses.push(fetched.status);
        }

        assert_eq!(computations.load(Ordering::SeqCst), 1);
        assert_eq!(statuses, vec![CacheStatus::Miss, CacheStatus::Hit]);
    }

    #[tokio::test]
    async fn test_throttled_cached_route_skips_cache() {
        let store = MemoryStore::new();
        let gate = gate(&store);
        let header = bearer("u1@example.com");

        for _ in 0..2 {
            gate.admit(Some(&header), "/x").await.unwrap();
        }

        let result = gate
            .run_cached(Some(&header), "/x", "2024-W01", |_| async { Ok(1u32) })
            .await;
        assert!(matches!(result, Err(GateError::QuotaExceeded { retry_after_secs: 60 })));
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let gate = gate(&store);

        let result = gate.admit(Some(&bearer("u1@example.com")), "/x").await;
        assert!(matches!(result, Err(GateError::StoreUnavailable(_))));
    }
}
