//! Logging and optional OTLP export.
//!
//! `tracing` output always goes to stdout. With the `telemetry` flag on, spans
//! and `log` records are also shipped to an OTLP collector and every request
//! gets a server span from [`OtelTraceLayer`].

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use opentelemetry::{
    global,
    trace::{SpanKind, SpanRef, Status, TraceContextExt, Tracer},
    Context, KeyValue,
};
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{logs::SdkLoggerProvider, trace::SdkTracerProvider, Resource};
use std::{
    future::Future,
    pin::Pin,
    sync::OnceLock,
    task::{Context as TaskContext, Poll},
};
use tower::{Layer, Service};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::auth::jwt::Claims;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const TRACER_NAME: &str = "crimeportal";

static LOGGER_PROVIDER: OnceLock<SdkLoggerProvider> = OnceLock::new();

/// Install the stdout subscriber, filtered by `RUST_LOG` (default `info`).
/// Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Where and as whom to export.
#[derive(Debug, Clone)]
pub struct OtlpSettings {
    pub endpoint: String,
    pub service_name: String,
    pub environment: String,
}

impl OtlpSettings {
    /// `None` when `OTEL_EXPORTER_OTLP_ENDPOINT` is unset.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
        Some(Self {
            endpoint,
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| TRACER_NAME.to_string()),
            environment: std::env::var("DEPLOY_ENV").unwrap_or_else(|_| "development".to_string()),
        })
    }

    fn secure(&self) -> bool {
        self.endpoint.starts_with("https://")
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_service_name(self.service_name.clone())
            .with_attribute(KeyValue::new("service.version", APP_VERSION))
            .with_attribute(KeyValue::new("deployment.environment", self.environment.clone()))
            .build()
    }
}

fn tls() -> opentelemetry_otlp::tonic_types::transport::ClientTlsConfig {
    opentelemetry_otlp::tonic_types::transport::ClientTlsConfig::new().with_native_roots()
}

/// Start OTLP span and log export. Needs a running Tokio runtime. Without an
/// endpoint configured this only logs and returns.
pub fn init_telemetry() -> Result<(), String> {
    let Some(settings) = OtlpSettings::from_env() else {
        tracing::info!("OTEL_EXPORTER_OTLP_ENDPOINT not set, telemetry stays local");
        return Ok(());
    };
    let resource = settings.resource();

    let spans = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&settings.endpoint);
    let spans = if settings.secure() { spans.with_tls_config(tls()) } else { spans };
    let span_exporter = spans
        .build()
        .map_err(|e| format!("OTLP span exporter: {e}"))?;
    global::set_tracer_provider(
        SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_resource(resource.clone())
            .build(),
    );

    let logs = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(&settings.endpoint);
    let logs = if settings.secure() { logs.with_tls_config(tls()) } else { logs };
    let log_exporter = logs
        .build()
        .map_err(|e| format!("OTLP log exporter: {e}"))?;
    let provider = LOGGER_PROVIDER.get_or_init(|| {
        SdkLoggerProvider::builder()
            .with_batch_exporter(log_exporter)
            .with_resource(resource)
            .build()
    });

    let bridge = opentelemetry_appender_log::OpenTelemetryLogBridge::new(provider);
    if log::set_boxed_logger(Box::new(bridge)).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    } else {
        tracing::warn!("A `log` logger is already installed, OTLP log bridge skipped");
    }

    tracing::info!(
        endpoint = %settings.endpoint,
        service = %settings.service_name,
        version = APP_VERSION,
        "OTLP export enabled"
    );
    Ok(())
}

fn is_id_segment(segment: &str) -> bool {
    let hexish =
        segment.len() >= 16 && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    let numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
    hexish || numeric
}

/// Collapse id-like path segments so span names stay low-cardinality.
///
/// `/api/complaints/6f1c…/update` becomes `/api/complaints/{id}/update`.
fn route_template(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_id_segment(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// The complaint a request targets, when the path names one.
fn complaint_id(path: &str) -> Option<&str> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some("api"), Some("complaints"), Some(id)) if is_id_segment(id) => Some(id),
        (Some("api"), Some("admin"), Some("complaints")) => {
            segments.next().filter(|id| is_id_segment(id))
        }
        _ => None,
    }
}

fn header<'a>(req: &'a Request<Body>, name: &str) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Span name and attributes for an incoming request.
fn request_span(req: &Request<Body>) -> (String, Vec<KeyValue>) {
    let path = req.uri().path();
    let route = route_template(path);
    let mut attributes = vec![
        KeyValue::new("http.method", req.method().to_string()),
        KeyValue::new("http.route", route.clone()),
        KeyValue::new("http.user_agent", header(req, "user-agent").to_string()),
        KeyValue::new("http.request_id", header(req, "x-request-id").to_string()),
    ];
    match req.extensions().get::<Claims>() {
        Some(claims) => attributes.push(KeyValue::new("portal.user_id", claims.sub.to_string())),
        None => attributes.push(KeyValue::new("portal.caller", "anonymous")),
    }
    if let Some(id) = complaint_id(path) {
        attributes.push(KeyValue::new("portal.complaint_id", id.to_string()));
    }
    (format!("{} {route}", req.method()), attributes)
}

fn record_status(span: &SpanRef<'_>, status: StatusCode) {
    span.set_attribute(KeyValue::new("http.status_code", i64::from(status.as_u16())));
    if status.is_server_error() {
        span.set_status(Status::error(status.to_string()));
    } else if status.is_client_error() {
        span.set_attribute(KeyValue::new("error.type", "client_error"));
    }
}

/// One server span per request. Sits inside the auth middleware so the
/// caller's id is known.
#[derive(Clone)]
pub struct OtelTraceLayer;

impl<S> Layer<S> for OtelTraceLayer {
    type Service = OtelTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OtelTraceService { inner }
    }
}

#[derive(Clone)]
pub struct OtelTraceService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for OtelTraceService<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let tracer = global::tracer(TRACER_NAME);
        let (name, attributes) = request_span(&req);
        let span = tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .with_attributes(attributes)
            .start(&tracer);
        let cx = Context::current_with_span(span);

        let future = {
            let _guard = cx.clone().attach();
            self.inner.call(req)
        };

        Box::pin(async move {
            let result = future.await;
            let span = cx.span();
            match &result {
                Ok(response) => record_status(&span, response.status()),
                Err(_) => span.set_status(Status::error("handler failed")),
            }
            span.end();
            result
        })
    }
}
