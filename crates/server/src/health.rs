//! Liveness and dependency report at `/health`.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

use crate::db::AppState;

static STARTED: OnceLock<Instant> = OnceLock::new();

pub fn record_start_time() {
    STARTED.get_or_init(Instant::now);
}

/// State of one adapter the portal depends on.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ComponentHealth {
    /// Adapter in use, e.g. `postgres`, `memory`, `local`, `s3`, `mailgun`.
    pub backend: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn up(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            healthy: true,
            error: None,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the repository cannot be reached.
    pub status: String,
    pub repository: ComponentHealth,
    pub evidence_store: ComponentHealth,
    pub notifier: ComponentHealth,
    pub uptime_seconds: u64,
    pub version: String,
}

/// Only the repository is probed. The evidence store and mail transport are
/// reported by name; their failures surface on the requests that use them.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All dependencies reachable", body = HealthResponse),
        (status = 503, description = "Repository unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let repo = state.engine.repo();
    let repository = match repo.ping().await {
        Ok(()) => ComponentHealth::up(repo.backend()),
        Err(e) => {
            tracing::warn!(backend = repo.backend(), error = %e.message, "Repository health probe failed");
            ComponentHealth {
                backend: repo.backend().to_string(),
                healthy: false,
                error: Some(e.message),
            }
        }
    };

    let (code, status) = if repository.healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status.to_string(),
        repository,
        evidence_store: ComponentHealth::up(state.engine.evidence_store().backend()),
        notifier: ComponentHealth::up(state.engine.notifier().transport()),
        uptime_seconds: STARTED.get().map_or(0, |t| t.elapsed().as_secs()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    (code, Json(body))
}
