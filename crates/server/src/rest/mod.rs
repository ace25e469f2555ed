pub mod admin;
pub mod auth;
pub mod complaint;
pub mod multipart;
pub mod user;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use shared_types::AppError;
use uuid::Uuid;

use crate::db::AppState;
use crate::rate_limit::{rate_limit_middleware, RateLimitState};

/// Parse a path id, rejecting anything that is not a UUID.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::invalid_field("id", "Invalid UUID format"))
}

pub(crate) fn pdf_response(pdf: Vec<u8>, filename: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{filename}\""),
            ),
        ],
        pdf,
    )
        .into_response()
}

/// Build the REST router. Only the `/api/auth` routes are rate limited.
pub fn api_router(auth_limiter: RateLimitState) -> Router<AppState> {
    let auth_routes = Router::new()
        .route("/api/auth/send-otp", post(auth::send_otp))
        .route("/api/auth/verify-otp", post(auth::verify_otp))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .layer(axum::middleware::from_fn_with_state(
            auth_limiter,
            rate_limit_middleware,
        ));

    Router::new()
        // Complaints
        .route(
            "/api/complaints",
            get(complaint::list_complaints).post(complaint::file_complaint),
        )
        .route("/api/complaints/emergency", post(complaint::file_emergency))
        .route("/api/complaints/files/{evidence_id}", get(complaint::serve_evidence))
        .route("/api/complaints/{id}", get(complaint::get_complaint))
        .route("/api/complaints/{id}/update", post(complaint::append_update))
        .route("/api/complaints/{id}/edit", put(complaint::edit_complaint))
        .route("/api/complaints/{id}/withdraw", post(complaint::withdraw_complaint))
        .route("/api/complaints/{id}/fir-pdf", get(complaint::fir_pdf))
        // Users
        .route(
            "/api/users/me",
            get(user::get_me).put(user::update_me).delete(user::delete_me),
        )
        .route("/api/users/me/notifications", get(user::list_notifications))
        .route(
            "/api/users/me/notifications/{id}/read",
            put(user::mark_notification_read),
        )
        // Admin
        .route(
            "/api/admin/officers",
            get(admin::list_officers).post(admin::create_officer),
        )
        .route("/api/admin/complaints/{id}/notes", post(admin::add_note))
        .route(
            "/api/admin/complaints/{id}/report-pdf",
            get(admin::complaint_report_pdf),
        )
        .route("/api/admin/statistics", get(admin::statistics))
        .route("/api/admin/statistics/pdf", get(admin::statistics_pdf))
        .merge(auth_routes)
}
