use crate::auth::Verifier;
use crate::cache::AggregationCache;
use crate::config::{Config, StoreBackend};
use crate::error::{GateError, Result};
use crate::gate::Gate;
use crate::handlers::{
    daily_dashboard, get_goals, health_check, list_meals, log_calories, log_strength, metrics, ping,
    profile, set_goals, today_meals, weekly_dashboard, AppState, SharedState,
};
use crate::health::HealthChecker;
use crate::ledger::{FitnessLedger, MemoryLedger};
use crate::metrics::MetricsCollector;
use crate::middleware::{gate_middleware, logging_middleware};
use crate::rate_limiter::RateLimiter;
use crate::store::{CacheStore, MemoryStore, QuotaStore, RedisStore};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assemble the gate and its collaborators over a single shared store.
pub fn build_state<S>(config: &Config, store: S, ledger: Arc<dyn FitnessLedger>) -> Result<SharedState>
where
    S: QuotaStore + CacheStore + 'static,
{
    let store = Arc::new(store);
    let quota_store: Arc<dyn QuotaStore> = store.clone();
    let cache_store: Arc<dyn CacheStore> = store;
    let timeout = config.store_timeout();

    let verifier = Verifier::new(config.jwt_secret.as_deref(), config.jwt_leeway_secs);
    if !verifier.is_configured() {
        tracing::warn!("JWT_SECRET is not set; every gated request will be refused");
    }

    let gate = Gate::new(
        verifier,
        RateLimiter::new(quota_store.clone(), timeout),
        AggregationCache::new(cache_store, config.weekly_cache_ttl(), timeout),
        config.route_policies()?,
        MetricsCollector::new(),
    );

    Ok(Arc::new(AppState {
        gate,
        ledger,
        health: HealthChecker::new(quota_store, timeout),
    }))
}

pub fn create_app(state: SharedState) -> Router {
    let gated = Router::new()
        .route("/profile", get(profile))
        .route("/dashboard", get(daily_dashboard))
        .route("/dashboard/weekly", get(weekly_dashboard))
        .route("/meals", get(list_meals))
        .route("/meals/today", get(today_meals))
        .route("/log-calories", post(log_calories))
        .route("/log-strength", post(log_strength))
        .route("/goals", get(get_goals))
        .route("/goals/set", post(set_goals))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate_middleware));

    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .merge(gated)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self> {
        let ledger: Arc<dyn FitnessLedger> = Arc::new(MemoryLedger::new());

        let state = match config.store_backend {
            StoreBackend::Redis => {
                let store = RedisStore::connect(&config.redis_url).await?;
                tracing::info!("Connected to Redis store");
                build_state(&config, store, ledger)?
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; quotas are local to this process");
                build_state(&config, MemoryStore::new(), ledger)?
            }
        };

        Ok(Self {
            app: create_app(state),
            bind_addr: config.bind_addr,
        })
    }

    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| GateError::Internal(format!("Failed to bind {}: {}", self.bind_addr, e)))?;

        tracing::info!("fitgate listening on {}", self.bind_addr);
        tracing::info!("Health check available at /health");

        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GateError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
