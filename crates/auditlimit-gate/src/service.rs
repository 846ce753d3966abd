//! Audit gate service - HTTP surface and lifecycle.
//!
//! Serves `POST /audit_limit`, `GET /health` and `GET /metrics`.

use crate::adapters::{HttpEntitlementClient, HttpModerationClient, MemoryEntitlementCache};
use crate::domain::{AdmissionDecision, GateConfig, GateError};
use crate::gate::AdmissionGate;
use crate::limiter::{cleanup_task, VisitorRegistry};
use crate::middleware::{GateMetrics, RequestTimer, TimeoutLayer, TracingLayer};
use crate::policy::{ContentFilter, EntitlementResolver};
use crate::ports::{Clock, EntitlementCache, EntitlementClient, ModerationClient, SystemClock};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::map_response_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info};

/// Outbound collaborators of the gate
pub struct Dependencies {
    pub moderation: Option<Arc<dyn ModerationClient>>,
    pub entitlement: Option<Arc<dyn EntitlementClient>>,
    pub cache: Arc<dyn EntitlementCache>,
    pub clock: Arc<dyn Clock>,
}

impl Dependencies {
    /// Production wiring: HTTP clients for configured services, an
    /// in-process cache and the system clock.
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        let dependency_timeout = config.timeouts.dependency;

        let moderation: Option<Arc<dyn ModerationClient>> = match &config.moderation.api_key {
            Some(key) if config.moderation.is_enabled() => Some(Arc::new(
                HttpModerationClient::new(&config.moderation.endpoint, key, dependency_timeout)?,
            )),
            _ => None,
        };

        let entitlement: Option<Arc<dyn EntitlementClient>> = match &config.entitlement.endpoint {
            Some(endpoint) => Some(Arc::new(HttpEntitlementClient::new(
                endpoint,
                dependency_timeout,
            )?)),
            None => None,
        };

        Ok(Self {
            moderation,
            entitlement,
            cache: Arc::new(MemoryEntitlementCache::new()),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Audit gate service state
pub struct AuditLimitService {
    config: GateConfig,
    gate: Arc<AdmissionGate>,
    cache: Arc<dyn EntitlementCache>,
    clock: Arc<dyn Clock>,
    metrics: Arc<GateMetrics>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<std::io::Result<()>>>,
    cleanup: Vec<JoinHandle<()>>,
}

impl AuditLimitService {
    /// Create the service with production dependencies
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        let dependencies = Dependencies::from_config(&config)?;
        Self::with_dependencies(config, dependencies)
    }

    /// Create the service around caller-supplied collaborators
    pub fn with_dependencies(
        config: GateConfig,
        dependencies: Dependencies,
    ) -> Result<Self, GateError> {
        config.validate()?;

        let metrics = Arc::new(GateMetrics::new());
        let filter = ContentFilter::new(
            config.content.forbidden_terms.clone(),
            dependencies.moderation,
            Arc::clone(&metrics),
        );
        let resolver = EntitlementResolver::new(
            dependencies.entitlement,
            Arc::clone(&dependencies.cache),
            config.entitlement.cache_ttl,
            Arc::clone(&metrics),
        );
        let gate = Arc::new(AdmissionGate::new(
            filter,
            resolver,
            Arc::new(VisitorRegistry::new()),
            config.tiers.clone(),
            Arc::clone(&dependencies.clock),
        ));

        Ok(Self {
            config,
            gate,
            cache: dependencies.cache,
            clock: dependencies.clock,
            metrics,
            shutdown_tx: None,
            server: None,
            cleanup: Vec::new(),
        })
    }

    /// Bind the listener and serve in the background. Returns the bound
    /// address (useful with port 0).
    pub async fn start(&mut self) -> Result<SocketAddr, GateError> {
        info!("Starting audit gate...");

        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GateError::Bind(format!("{}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GateError::Bind(e.to_string()))?;

        self.start_cleanup_tasks();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let router = self.router();
        self.server = Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        }));

        info!(addr = %local_addr, "Audit gate listening");
        Ok(local_addr)
    }

    /// Stop accepting requests, drain in-flight ones and stop cleanup tasks
    pub async fn shutdown(&mut self) -> Result<(), GateError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        for task in self.cleanup.drain(..) {
            task.abort();
        }

        if let Some(server) = self.server.take() {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "HTTP server error");
                    return Err(GateError::Serve(e.to_string()));
                }
                Err(e) => return Err(GateError::Serve(e.to_string())),
            }
        }

        info!("Audit gate stopped");
        Ok(())
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GateMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn gate(&self) -> Arc<AdmissionGate> {
        Arc::clone(&self.gate)
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let state = AppState {
            gate: Arc::clone(&self.gate),
            metrics: Arc::clone(&self.metrics),
        };

        let layers = ServiceBuilder::new()
            .layer(TracingLayer::new())
            .layer(TimeoutLayer::new(self.config.timeouts.request));

        Router::new()
            .route("/audit_limit", post(handle_audit_limit))
            .route("/health", get(health_check))
            .route("/metrics", get(metrics_snapshot))
            .layer(RequestBodyLimitLayer::new(self.config.server.max_request_size))
            .layer(map_response_with_state(
                self.config.server.max_request_size,
                payload_too_large_detail,
            ))
            .layer(layers)
            .with_state(state)
    }

    fn start_cleanup_tasks(&mut self) {
        let interval = self.config.registry.cleanup_interval;

        // Idle bucket eviction
        self.cleanup.push(tokio::spawn(cleanup_task(
            Arc::clone(self.gate.registry()),
            Arc::clone(&self.clock),
            interval,
        )));

        // Expired entitlement sweep
        let cache = Arc::clone(&self.cache);
        self.cleanup.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, "Entitlement cache cleanup");
                }
            }
        }));
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    gate: Arc<AdmissionGate>,
    metrics: Arc<GateMetrics>,
}

async fn handle_audit_limit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let timer = RequestTimer::new(Arc::clone(&state.metrics));
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let decision = state.gate.admit(authorization, &body).await;
    debug!(decision = decision.label(), "Admission decided");
    timer.finish(&decision);

    decision_response(&decision)
}

/// Render a decision as status, headers and `{"detail": ...}`
fn decision_response(decision: &AdmissionDecision) -> Response {
    let status =
        StatusCode::from_u16(decision.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(serde_json::json!({ "detail": decision.detail() }))).into_response();

    if let Some(secs) = decision.retry_after_secs() {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    if matches!(decision, AdmissionDecision::Unauthorized) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }

    response
}

/// Replace the plain-text 413 of the body limit with the usual detail body
async fn payload_too_large_detail(State(limit): State<usize>, response: Response) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(serde_json::json!({
            "detail": format!("Request body exceeds the {} byte limit.", limit)
        })),
    )
        .into_response()
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.to_json(state.gate.registry().len()))
}
