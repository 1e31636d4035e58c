use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::cache::CacheStatus;

/// Per-process gate counters for one route. Not shared across instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub admitted_requests: u64,
    pub throttled_requests: u64,
    pub rejected_credentials: u64,
    pub store_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub since: u64,
}

impl Default for RouteMetrics {
    fn default() -> Self {
        Self {
            admitted_requests: 0,
            throttled_requests: 0,
            rejected_credentials: 0,
            store_failures: 0,
            cache_hits: 0,
            cache_misses: 0,
            since: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

/// Outcome of one pass through the gate, as far as metrics care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Admitted,
    Throttled,
    Unauthenticated,
    StoreFailure,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    routes: Arc<RwLock<HashMap<String, RouteMetrics>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_outcome(&self, route: &str, outcome: GateOutcome) {
        let mut routes = self.routes.write().await;
        let metrics = routes.entry(route.to_string()).or_default();

        match outcome {
            GateOutcome::Admitted => metrics.admitted_requests += 1,
            GateOutcome::Throttled => metrics.throttled_requests += 1,
            GateOutcome::Unauthenticated => metrics.rejected_credentials += 1,
            GateOutcome::StoreFailure => metrics.store_failures += 1,
        }
    }

    pub async fn record_cache(&self, route: &str, status: CacheStatus) {
        let mut routes = self.routes.write().await;
        let metrics = routes.entry(route.to_string()).or_default();

        match status {
            CacheStatus::Hit => metrics.cache_hits += 1,
            CacheStatus::Miss => metrics.cache_misses += 1,
        }
    }

    pub async fn route_metrics(&self, route: &str) -> Option<RouteMetrics> {
        let routes = self.routes.read().await;
        routes.get(route).cloned()
    }

    pub async fn all_metrics(&self) -> HashMap<String, RouteMetrics> {
        let routes = self.routes.read().await;
        routes.clone()
    }

    pub async fn totals(&self) -> RouteMetrics {
        let routes = self.routes.read().await;
        let mut global = RouteMetrics::default();

        for metrics in routes.values() {
            global.admitted_requests += metrics.admitted_requests;
            global.throttled_requests += metrics.throttled_requests;
            global.rejected_credentials += metrics.rejected_credentials;
            global.store_failures += metrics.store_failures;
            global.cache_hits += metrics.cache_hits;
            global.cache_misses += metrics.cache_misses;
        }

        global
    }
}
