use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::Utc;
use shared_types::{
    AdminNoteRequest, AppError, Complaint, ComplaintStatistics, CreateOfficerRequest, Role, User,
    UserProfile,
};
use uuid::Uuid;

use super::complaint::render_fir;
use super::{parse_id, pdf_response};
use crate::auth::extractors::{AdminCaller, Caller};
use crate::auth::password as pw;
use crate::db::AppState;
use crate::error_convert::ValidateRequest;
use crate::notify::{dispatch, NotificationEvent};
use crate::typst::statistics_report;

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[utoipa::path(
    get,
    path = "/api/admin/officers",
    responses(
        (status = 200, description = "All officer accounts", body = Vec<UserProfile>),
        (status = 403, description = "Admin only", body = AppError)
    ),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin), fields(admin = %admin.id))]
pub async fn list_officers(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let officers = state.engine.repo().list_officers().await?;
    Ok(Json(officers.iter().map(UserProfile::from).collect()))
}

/// POST /api/admin/officers
///
/// Provision a verified officer. The temporary password goes out only in the
/// welcome mail.
#[utoipa::path(
    post,
    path = "/api/admin/officers",
    request_body = CreateOfficerRequest,
    responses(
        (status = 201, description = "Officer created", body = UserProfile),
        (status = 403, description = "Admin only", body = AppError),
        (status = 409, description = "Email or badge already registered", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin, payload), fields(admin = %admin.id))]
pub async fn create_officer(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
    Json(payload): Json<CreateOfficerRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    payload.validate_request()?;

    let repo = state.engine.repo();
    let email = payload.email.trim().to_lowercase();
    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("An account with this email already exists"));
    }

    let temporary_password = pw::generate_temporary_password();
    let officer = User {
        id: Uuid::new_v4(),
        role: Role::Officer,
        full_name: payload.full_name.trim().to_string(),
        email,
        phone: payload.phone,
        national_id: payload.national_id,
        address: optional(payload.address),
        gender: optional(payload.gender),
        date_of_birth: payload.date_of_birth,
        password_hash: pw::hash_password(&temporary_password)?,
        posting_site: Some(payload.posting_site.trim().to_string()),
        badge_number: Some(payload.badge_number.trim().to_string()),
        verified: true,
        created_at: Utc::now(),
    };
    repo.insert_user(&officer).await?;
    tracing::info!(officer_id = %officer.id, "Officer provisioned");

    dispatch(
        state.engine.notifier(),
        officer.email.clone(),
        NotificationEvent::OfficerWelcome {
            full_name: officer.full_name.clone(),
            badge_number: officer.badge_number.clone().unwrap_or_default(),
            posting_site: officer.posting_site.clone().unwrap_or_default(),
            temporary_password,
        },
    );

    Ok((StatusCode::CREATED, Json(UserProfile::from(&officer))))
}

#[utoipa::path(
    post,
    path = "/api/admin/complaints/{id}/notes",
    params(("id" = String, Path, description = "Complaint UUID")),
    request_body = AdminNoteRequest,
    responses(
        (status = 200, description = "Note appended", body = Complaint),
        (status = 403, description = "Admin only", body = AppError),
        (status = 404, description = "Complaint not found", body = AppError),
        (status = 422, description = "Note is required", body = AppError)
    ),
    tag = "admin"
)]
#[tracing::instrument(skip(state, caller, payload), fields(caller = %caller.id))]
pub async fn add_note(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(payload): Json<AdminNoteRequest>,
) -> Result<Json<Complaint>, AppError> {
    let id = parse_id(&id)?;
    let complaint = state.engine.admin_note(&caller, id, payload.note).await?;
    Ok(Json(complaint))
}

#[utoipa::path(
    get,
    path = "/api/admin/statistics",
    responses(
        (status = 200, description = "Portal statistics", body = ComplaintStatistics),
        (status = 403, description = "Admin only", body = AppError)
    ),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin), fields(admin = %admin.id))]
pub async fn statistics(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
) -> Result<Json<ComplaintStatistics>, AppError> {
    Ok(Json(state.engine.statistics().await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/statistics/pdf",
    responses(
        (status = 200, description = "Statistics report", content_type = "application/pdf"),
        (status = 403, description = "Admin only", body = AppError)
    ),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin), fields(admin = %admin.id))]
pub async fn statistics_pdf(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
) -> Result<Response, AppError> {
    let stats = state.engine.statistics().await?;
    let pdf = statistics_report(&stats, Utc::now()).render().await?;
    Ok(pdf_response(pdf, "complaint-statistics.pdf"))
}

#[utoipa::path(
    get,
    path = "/api/admin/complaints/{id}/report-pdf",
    params(("id" = String, Path, description = "Complaint UUID")),
    responses(
        (status = 200, description = "Complaint report", content_type = "application/pdf"),
        (status = 403, description = "Admin only", body = AppError),
        (status = 404, description = "Complaint not found", body = AppError)
    ),
    tag = "admin"
)]
#[tracing::instrument(skip(state, admin), fields(admin = %admin.id))]
pub async fn complaint_report_pdf(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    render_fir(&state, &admin, id).await
}
