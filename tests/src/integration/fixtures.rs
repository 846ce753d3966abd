//! Shared fixtures: scripted collaborators and request helpers.

use async_trait::async_trait;
use auditlimit_gate::adapters::MemoryEntitlementCache;
use auditlimit_gate::domain::DependencyError;
use auditlimit_gate::ports::{EntitlementClient, ManualClock, ModerationClient};
use auditlimit_gate::{AuditLimitService, Dependencies, GateConfig};
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Entitlement service answering from a fixed set of premium identities
pub struct StaticEntitlement {
    premium: Mutex<HashSet<String>>,
    failing: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl StaticEntitlement {
    pub fn new(premium: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            premium: Mutex::new(premium.iter().map(|s| s.to_string()).collect()),
            failing: Mutex::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitlementClient for StaticEntitlement {
    async fn is_premium(&self, identity: &str) -> Result<bool, DependencyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock() {
            return Err(DependencyError::Transport("connection refused".into()));
        }
        Ok(self.premium.lock().contains(identity))
    }
}

/// Moderation behavior for a test
#[derive(Debug, Clone, Copy)]
pub enum ModerationMode {
    Clean,
    Flag,
    Fail,
}

pub struct ScriptedModeration {
    mode: ModerationMode,
    pub calls: AtomicUsize,
}

impl ScriptedModeration {
    pub fn new(mode: ModerationMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ModerationClient for ScriptedModeration {
    async fn is_flagged(&self, _text: &str) -> Result<bool, DependencyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ModerationMode::Clean => Ok(false),
            ModerationMode::Flag => Ok(true),
            ModerationMode::Fail => Err(DependencyError::Timeout(Duration::from_secs(5))),
        }
    }
}

/// Service wired to scripted collaborators and a manual clock
pub struct Harness {
    pub service: AuditLimitService,
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub entitlement: Arc<StaticEntitlement>,
}

impl Harness {
    pub fn new(config: GateConfig, premium: &[&str], moderation: Option<ModerationMode>) -> Self {
        let clock = Arc::new(ManualClock::new());
        let entitlement = StaticEntitlement::new(premium);
        let moderation: Option<Arc<dyn ModerationClient>> = match moderation {
            Some(mode) => Some(ScriptedModeration::new(mode)),
            None => None,
        };

        let service = AuditLimitService::with_dependencies(
            config,
            Dependencies {
                moderation,
                entitlement: Some(entitlement.clone()),
                cache: Arc::new(MemoryEntitlementCache::new()),
                clock: clock.clone(),
            },
        )
        .unwrap();
        let router = service.router();

        Self {
            service,
            router,
            clock,
            entitlement,
        }
    }

    pub async fn audit(&self, token: Option<&str>, model: &str, text: &str) -> Reply {
        send(self.router.clone(), audit_request(token, model, text)).await
    }

    pub async fn get(&self, uri: &str) -> Reply {
        send(
            self.router.clone(),
            Request::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await
    }
}

/// Small-budget config: standard tier `limit` per `period`, heavy tier 1 per `period`
pub fn config(limit: u32, period: Duration) -> GateConfig {
    let mut config = GateConfig::default();
    config.tiers.standard.limit = limit;
    config.tiers.standard.period = period;
    config.tiers.heavy.limit = 1;
    config.tiers.heavy.period = period;
    config.content.forbidden_terms = vec!["xyz".to_string()];
    config
}

pub fn audit_request(token: Option<&str>, model: &str, text: &str) -> Request<Body> {
    let body = serde_json::json!({
        "action": "next",
        "model": model,
        "messages": [{"content": {"content_type": "text", "parts": [text]}}]
    });
    let mut builder = Request::builder()
        .method("POST")
        .uri("/audit_limit")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Decoded response
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl Reply {
    pub fn detail(&self) -> &serde_json::Value {
        &self.body["detail"]
    }

    pub fn retry_after(&self) -> Option<u64> {
        self.headers
            .get(header::RETRY_AFTER)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }
}

pub async fn send(router: Router, request: Request<Body>) -> Reply {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Reply {
        status,
        headers,
        body: serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null),
    }
}
