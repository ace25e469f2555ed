//! Startup configuration.
//!
//! Two sources: `config.toml` for adapter switches and optional limits, then
//! the environment (after `.env`). An environment variable always wins over
//! the file.

use shared_types::AppConfig;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::auth::jwt::JwtConfig;

static FILE_CONFIG: OnceLock<AppConfig> = OnceLock::new();

const CONFIG_PATH: &str = "config.toml";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_EVIDENCE_DIR: &str = "./data/evidence";
const DEFAULT_EVIDENCE_BUCKET: &str = "evidence";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_AUTH_RATE_LIMIT: u32 = 20;
const DEFAULT_EVIDENCE_IO_TIMEOUT_SECS: u64 = 30;

/// First of two environment variables that is set.
pub fn env_or(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .or_else(|| std::env::var(fallback).ok())
}

/// Parse a `config.toml` body. A malformed file counts as empty.
pub fn parse_config(contents: &str) -> AppConfig {
    toml::from_str(contents).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring malformed {CONFIG_PATH}");
        AppConfig::default()
    })
}

/// Read `config.toml` once for the life of the process.
pub fn load_file_config() -> &'static AppConfig {
    FILE_CONFIG.get_or_init(|| match std::fs::read_to_string(CONFIG_PATH) {
        Ok(contents) => {
            let config = parse_config(&contents);
            tracing::info!(adapters = ?config.features.enabled(), "Loaded {CONFIG_PATH}");
            config
        }
        Err(e) => {
            tracing::info!(error = %e, "No {CONFIG_PATH}, using local adapters");
            AppConfig::default()
        }
    })
}

/// Process configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Absent means the in-memory repository.
    pub database_url: Option<String>,
    pub evidence_dir: PathBuf,
    pub evidence_bucket: String,
    pub max_upload_bytes: usize,
    /// Deadline for each evidence chunk and each storage backend call.
    pub evidence_io_timeout: Duration,
    pub admin_email: Option<String>,
    /// Requests per minute per client on `/api/auth/*`.
    pub auth_rate_limit: u32,
    pub jwt: JwtConfig,
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{name} is not a valid number: {raw}")),
        _ => Ok(None),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env(file: &AppConfig) -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let max_upload_bytes = parsed_env("MAX_UPLOAD_BYTES")?
            .or(file.limits.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let auth_rate_limit = parsed_env("AUTH_RATE_LIMIT_PER_MINUTE")?
            .or(file.limits.auth_rate_limit_per_minute)
            .unwrap_or(DEFAULT_AUTH_RATE_LIMIT);
        let evidence_io_timeout_secs = parsed_env("EVIDENCE_IO_TIMEOUT_SECS")?
            .or(file.limits.evidence_io_timeout_secs)
            .unwrap_or(DEFAULT_EVIDENCE_IO_TIMEOUT_SECS);
        if evidence_io_timeout_secs == 0 {
            return Err("EVIDENCE_IO_TIMEOUT_SECS must be at least 1".to_string());
        }

        Ok(Self {
            bind_addr: non_empty_env("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            database_url: non_empty_env("DATABASE_URL"),
            evidence_dir: non_empty_env("EVIDENCE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EVIDENCE_DIR)),
            evidence_bucket: env_or("EVIDENCE_BUCKET", "S3_BUCKET")
                .unwrap_or_else(|| DEFAULT_EVIDENCE_BUCKET.to_string()),
            max_upload_bytes,
            evidence_io_timeout: Duration::from_secs(evidence_io_timeout_secs),
            admin_email: non_empty_env("ADMIN_EMAIL"),
            auth_rate_limit,
            jwt: JwtConfig::from_env()?,
        })
    }
}
