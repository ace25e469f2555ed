use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::auth::jwt::JwtConfig;
use crate::auth::otp::OtpCache;
use crate::lifecycle::ComplaintEngine;
use crate::rate_limit::RateLimitState;

/// Shared application state passed to Axum handlers via `State`.
/// Derives `FromRef` so handlers can extract a single piece directly.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub engine: ComplaintEngine,
    pub otp: OtpCache,
    pub jwt: JwtConfig,
    pub auth_limiter: RateLimitState,
    pub settings: Arc<PortalSettings>,
}

/// Request-independent settings the handlers consult.
#[derive(Debug, Clone, Default)]
pub struct PortalSettings {
    /// Logging in with this address promotes the account to admin.
    pub admin_email: Option<String>,
}

/// Create a new database connection pool.
/// Uses `connect_lazy` so no connections open until the first query.
pub fn create_pool(database_url: &str) -> Result<Pool<Postgres>, sqlx::Error> {
    let max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_lazy(database_url)
}

/// Run database migrations against the given pool.
pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
