use axum::Router;
use shared_types::{
    Accused, AccusedStatus, AdminNoteRequest, AppError, AppErrorKind, AuditEntry, AuthResponse,
    AuthorKind, Complaint, ComplaintEdit, ComplaintForm, ComplaintStatistics, ComplaintStatus,
    ComplaintView, CountEntry, CreateOfficerRequest, EmergencyForm, EvidenceRef, LoginRequest,
    MessageResponse, Notification, NotificationCategory, OfficerWorkload, PartySummary,
    RegisterRequest, Role, SendOtpRequest, UpdateForm, UpdateProfileRequest, UserProfile,
    VerifyOtpRequest, Victim, WithdrawRequest,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::db::AppState;
use crate::health::{self, ComponentHealth, HealthResponse};
use crate::rest;

#[derive(OpenApi)]
#[openapi(
    paths(
        // Complaints
        rest::complaint::file_complaint,
        rest::complaint::file_emergency,
        rest::complaint::list_complaints,
        rest::complaint::get_complaint,
        rest::complaint::append_update,
        rest::complaint::edit_complaint,
        rest::complaint::withdraw_complaint,
        rest::complaint::serve_evidence,
        rest::complaint::fir_pdf,
        // Auth
        rest::auth::send_otp,
        rest::auth::verify_otp,
        rest::auth::register,
        rest::auth::login,
        // Users
        rest::user::get_me,
        rest::user::update_me,
        rest::user::delete_me,
        rest::user::list_notifications,
        rest::user::mark_notification_read,
        // Admin
        rest::admin::list_officers,
        rest::admin::create_officer,
        rest::admin::add_note,
        rest::admin::statistics,
        rest::admin::statistics_pdf,
        rest::admin::complaint_report_pdf,
        // Health
        health::health_check,
    ),
    components(schemas(
        AppError, AppErrorKind, MessageResponse,
        Complaint, ComplaintView, ComplaintStatus, PartySummary, AuditEntry, AuthorKind,
        EvidenceRef, Victim, Accused, AccusedStatus,
        ComplaintForm, EmergencyForm, ComplaintEdit, UpdateForm, WithdrawRequest,
        AdminNoteRequest, ComplaintStatistics, CountEntry, OfficerWorkload,
        SendOtpRequest, VerifyOtpRequest, RegisterRequest, LoginRequest, AuthResponse,
        UserProfile, Role, UpdateProfileRequest, CreateOfficerRequest,
        Notification, NotificationCategory,
        HealthResponse, ComponentHealth,
    )),
    tags(
        (name = "complaints", description = "Complaint filing, tracking and investigation"),
        (name = "auth", description = "One-time codes, registration and login"),
        (name = "users", description = "Profile, account deletion and inbox"),
        (name = "admin", description = "Officer provisioning, notes, statistics and reports"),
        (name = "health", description = "Health check endpoint")
    ),
    info(
        title = "Crime Reporting Portal API",
        description = "Complaint lifecycle, evidence and case assignment API",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;

/// The REST API at `/api/*`, `/health`, and the API docs at `/docs`.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(rest::api_router(state.auth_limiter.clone()))
        .route("/health", axum::routing::get(health::health_check))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
}

/// [`api_router`] with the request-level layers: OpenTelemetry spans when
/// `telemetry` is set, the upload limit, bearer-token decoding and request ids.
pub fn app_router(state: AppState, max_upload_bytes: usize, telemetry: bool) -> Router {
    let mut router = api_router(state.clone());

    if telemetry {
        router = router.layer(crate::telemetry::OtelTraceLayer);
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(max_upload_bytes))
        .layer(axum::middleware::from_fn_with_state(
            state,
            crate::auth::middleware::auth_middleware,
        ))
        .layer(tower_http::request_id::PropagateRequestIdLayer::x_request_id())
        .layer(tower_http::request_id::SetRequestIdLayer::x_request_id(
            tower_http::request_id::MakeRequestUuid,
        ))
}
