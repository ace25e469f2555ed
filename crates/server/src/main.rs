use std::sync::Arc;
use std::time::Duration;

use server::auth::otp::OtpCache;
use server::config::{load_file_config, ServerConfig};
use server::db::{AppState, PortalSettings};
use server::lifecycle::ComplaintEngine;
use server::notify::{LogNotifier, Notifier};
use server::rate_limit::RateLimitState;
use server::repo::{MemoryRepository, PgRepository, Repository};
use server::storage::{EvidenceStore, LocalEvidenceStore, S3EvidenceStore};

const OTP_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    server::telemetry::init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let file = load_file_config();
    let flags = file.features;
    let config = ServerConfig::from_env(file)?;

    if flags.telemetry {
        server::telemetry::init_telemetry()?;
    }
    server::health::record_start_time();

    let evidence: Arc<dyn EvidenceStore> = if flags.s3 {
        Arc::new(
            S3EvidenceStore::from_env(&config.evidence_bucket, config.evidence_io_timeout).await?,
        )
    } else {
        Arc::new(
            LocalEvidenceStore::new(&config.evidence_dir)
                .await
                .map_err(|e| e.message)?
                .with_io_timeout(config.evidence_io_timeout),
        )
    };

    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => {
            let pool = server::db::create_pool(url).map_err(|e| e.to_string())?;
            server::db::run_migrations(&pool)
                .await
                .map_err(|e| format!("Migrations failed: {e}"))?;
            Arc::new(PgRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory only");
            Arc::new(MemoryRepository::new())
        }
    };

    let notifier: Arc<dyn Notifier> = if flags.mailgun {
        Arc::new(server::mailgun::MailgunNotifier::from_env()?)
    } else {
        Arc::new(LogNotifier)
    };

    tracing::info!(
        repository = repo.backend(),
        evidence = evidence.backend(),
        notifier = notifier.transport(),
        "Adapters ready"
    );

    let otp = OtpCache::default();
    otp.spawn_sweeper(OTP_SWEEP_INTERVAL);

    let auth_limiter = RateLimitState::new(config.auth_rate_limit, Duration::from_secs(60));
    auth_limiter.spawn_pruner(RATE_LIMIT_PRUNE_INTERVAL);

    let state = AppState {
        engine: ComplaintEngine::new(repo, evidence, notifier),
        otp,
        jwt: config.jwt.clone(),
        auth_limiter,
        settings: Arc::new(PortalSettings {
            admin_email: config.admin_email.clone(),
        }),
    };

    let router = server::openapi::app_router(state, config.max_upload_bytes, flags.telemetry);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {e}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| format!("Server error: {e}"))
}
