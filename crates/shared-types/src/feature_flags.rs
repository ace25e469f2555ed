use serde::{Deserialize, Serialize};

/// Which optional adapters the portal wires in at startup.
///
/// A flag that is off means the local fallback: the log notifier, the
/// evidence directory on disk, and stdout-only tracing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct FeatureFlags {
    /// Case and account emails go out through Mailgun.
    pub mailgun: bool,
    /// Evidence blobs live in an S3-compatible bucket.
    pub s3: bool,
    /// Traces and logs are exported over OTLP.
    pub telemetry: bool,
}

impl FeatureFlags {
    /// Names of the adapters switched on, in a fixed order.
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            ("mailgun", self.mailgun),
            ("s3", self.s3),
            ("telemetry", self.telemetry),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

/// Optional overrides for the limits otherwise taken from the environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PortalLimits {
    pub auth_rate_limit_per_minute: Option<u32>,
    pub max_upload_bytes: Option<usize>,
    /// Seconds an evidence upload or download may sit idle.
    pub evidence_io_timeout_secs: Option<u64>,
}

/// Shape of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub features: FeatureFlags,
    pub limits: PortalLimits,
}
