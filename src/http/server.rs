//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Construct every security service from configuration (composition root)
//! - Create the Axum router with the admission middleware chain
//! - Wire up global layers (request id, tracing, concurrency cap, timeout, body limit)
//! - Apply hot-reloaded configuration
//! - Run background sweeps and serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::audit::AuditLog;
use crate::backends::{BackendRegistry, SecretStore};
use crate::config::GatewayConfig;
use crate::dispatch::DispatchEngine;
use crate::http::handlers;
use crate::http::middleware::{
    csrf::csrf_middleware, identity::identity_middleware, ip_guard::ip_guard_middleware,
    rate_limit::rate_limit_middleware,
};
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::sweeper::Sweeper;
use crate::security::{
    headers::apply_security_headers, ContentFilter, CsrfGuard, IpGuard, OriginGuard, RateLimiter,
    TokenIssuer,
};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Startup configuration. Reloadable settings live in the services below.
    pub config: Arc<GatewayConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub ip_guard: Arc<IpGuard>,
    pub csrf: Arc<CsrfGuard>,
    pub origins: Arc<OriginGuard>,
    pub audit: Arc<AuditLog>,
    pub filter: Arc<ContentFilter>,
    pub tokens: Arc<TokenIssuer>,
    pub engine: Arc<DispatchEngine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: GatewayConfig, registry: BackendRegistry, secrets: SecretStore) -> Self {
        let filter = Arc::new(ContentFilter::new(config.limits.max_payload_length));
        let engine = DispatchEngine::new(
            Arc::new(registry),
            Arc::new(secrets),
            filter.clone(),
            config.limits.clone(),
            Duration::from_secs(config.timeouts.backend_call_secs),
        );

        Self {
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            ip_guard: Arc::new(IpGuard::new(&config.ip_guard)),
            csrf: Arc::new(CsrfGuard::new(&config.csrf)),
            origins: Arc::new(OriginGuard::new(&config.csrf.allowed_origins)),
            audit: Arc::new(AuditLog::new(&config.audit)),
            tokens: Arc::new(TokenIssuer::new(&config.admin)),
            engine: Arc::new(engine),
            filter,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Apply the hot-reloadable subset of a new configuration.
    pub fn apply_reload(&self, new_config: &GatewayConfig) {
        self.ip_guard.update_lists(&new_config.ip_guard);
        self.origins.update_allowed(&new_config.csrf.allowed_origins);
        self.audit.set_enabled(new_config.audit.enabled);
        tracing::info!("Reloadable configuration applied");
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and backends.
    pub fn new(config: GatewayConfig, registry: BackendRegistry, secrets: SecretStore) -> Self {
        let state = AppState::new(config, registry, secrets);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();

        let calls_backends = Router::new()
            .route("/api/dispatch", post(handlers::dispatch))
            .route("/api/models", post(handlers::list_models))
            .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware));

        // Layers run bottom-up: origin/CSRF first, then the IP guard.
        let guarded = Router::new()
            .route("/api/csrf-token", get(handlers::csrf_token))
            .route("/api/backends", get(handlers::backends))
            .merge(calls_backends)
            .route_layer(from_fn_with_state(state.clone(), ip_guard_middleware))
            .route_layer(from_fn_with_state(state.clone(), csrf_middleware));

        let mut app = Router::new()
            .route("/api/health", get(handlers::health))
            .merge(guarded);

        if config.admin.enabled {
            app = app.merge(admin::router(state.clone()));
        }

        let app = app
            .with_state(state.clone())
            .layer(from_fn_with_state(state, identity_middleware));

        let app = if config.security.enable_headers {
            apply_security_headers(app)
        } else {
            app
        };

        app.layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_concurrent_requests))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(set_request_id_layer())
    }

    /// Shared state, e.g. for issuing tokens before serving.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.state.engine.registry().len(),
            "HTTP server starting"
        );

        let sweeper = Sweeper::new(
            self.state.rate_limiter.clone(),
            self.state.ip_guard.clone(),
            &self.state.config,
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let reload_state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => reload_state.apply_reload(&new_config),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
