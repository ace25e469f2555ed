use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use shared_types::{
    AppError, Complaint, ComplaintFilter, ComplaintListQuery, ComplaintView, User,
    WithdrawRequest,
};

use super::multipart::{read_form, MAX_FILING_FILES, MAX_UPDATE_FILES};
use super::{parse_id, pdf_response};
use crate::auth::extractors::{Caller, MaybeCaller};
use crate::db::AppState;
use crate::typst::{fir_report, FirParams};

/// POST /api/complaints
///
/// File a complaint. A bearer token is required unless `anonymous` is set.
#[utoipa::path(
    post,
    path = "/api/complaints",
    request_body(content = shared_types::ComplaintForm, content_type = "multipart/form-data",
        description = "Complaint fields plus up to five `evidence` files"),
    responses(
        (status = 201, description = "Complaint filed", body = Complaint),
        (status = 401, description = "Authentication required", body = AppError),
        (status = 422, description = "Validation error", body = AppError),
        (status = 502, description = "Evidence store unavailable", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller, multipart))]
pub async fn file_complaint(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Complaint>), AppError> {
    let parsed = read_form(multipart, state.engine.evidence_store(), MAX_FILING_FILES).await?;
    let (form, evidence) = parsed.into_complaint_form()?;
    let complaint = state
        .engine
        .file_complaint(form, evidence, caller.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

/// POST /api/complaints/emergency
#[utoipa::path(
    post,
    path = "/api/complaints/emergency",
    request_body(content = shared_types::EmergencyForm, content_type = "multipart/form-data",
        description = "Type, location, description plus up to five `evidence` files"),
    responses(
        (status = 201, description = "Emergency complaint filed", body = Complaint),
        (status = 401, description = "Authentication required", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller, multipart))]
pub async fn file_emergency(
    State(state): State<AppState>,
    Caller(caller): Caller,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Complaint>), AppError> {
    let parsed = read_form(multipart, state.engine.evidence_store(), MAX_FILING_FILES).await?;
    let (form, evidence) = parsed.into_emergency_form();
    let complaint = state
        .engine
        .file_emergency_complaint(form, evidence, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

/// GET /api/complaints
///
/// Users see their own complaints, officers their assigned cases, admins all.
#[utoipa::path(
    get,
    path = "/api/complaints",
    params(ComplaintListQuery),
    responses(
        (status = 200, description = "Complaints visible to the caller", body = Vec<ComplaintView>),
        (status = 401, description = "Authentication required", body = AppError),
        (status = 422, description = "Unknown status or sort order", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller))]
pub async fn list_complaints(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<ComplaintListQuery>,
) -> Result<Json<Vec<ComplaintView>>, AppError> {
    let filter = ComplaintFilter::from_query(&query)?;
    let complaints = state.engine.list_complaints(&caller, &filter).await?;
    Ok(Json(complaints))
}

#[utoipa::path(
    get,
    path = "/api/complaints/{id}",
    params(("id" = String, Path, description = "Complaint UUID")),
    responses(
        (status = 200, description = "Complaint found", body = ComplaintView),
        (status = 403, description = "Not readable by the caller", body = AppError),
        (status = 404, description = "Complaint not found", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller))]
pub async fn get_complaint(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<ComplaintView>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine.get_complaint(&caller, id).await?))
}

/// POST /api/complaints/{id}/update
///
/// Officer or admin update: a note, an optional status move, up to three files.
#[utoipa::path(
    post,
    path = "/api/complaints/{id}/update",
    params(("id" = String, Path, description = "Complaint UUID")),
    request_body(content = shared_types::UpdateForm, content_type = "multipart/form-data",
        description = "Note, optional status, up to three `evidence` files"),
    responses(
        (status = 200, description = "Update appended", body = Complaint),
        (status = 403, description = "Not the assigned officer or an admin", body = AppError),
        (status = 404, description = "Complaint not found", body = AppError),
        (status = 409, description = "Illegal transition or stale version", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller, multipart))]
pub async fn append_update(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Complaint>, AppError> {
    let id = parse_id(&id)?;
    if !state.engine.capabilities(&caller, id).await?.append_update {
        return Err(AppError::forbidden(
            "Only the assigned officer or an administrator may update this complaint",
        ));
    }

    let parsed = read_form(multipart, state.engine.evidence_store(), MAX_UPDATE_FILES).await?;
    let (form, evidence) = parsed.into_update_form()?;
    let complaint = state
        .engine
        .append_update(&caller, id, form, evidence)
        .await?;
    Ok(Json(complaint))
}

/// PUT /api/complaints/{id}/edit
///
/// Reporter edit while the complaint is still `Submitted`. Absent fields are
/// left as they are; new evidence is appended.
#[utoipa::path(
    put,
    path = "/api/complaints/{id}/edit",
    params(("id" = String, Path, description = "Complaint UUID")),
    request_body(content = shared_types::ComplaintEdit, content_type = "multipart/form-data",
        description = "Changed fields plus up to five `evidence` files"),
    responses(
        (status = 200, description = "Complaint edited", body = Complaint),
        (status = 403, description = "Not the reporter", body = AppError),
        (status = 404, description = "Complaint not found", body = AppError),
        (status = 409, description = "No longer editable or stale version", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller, multipart))]
pub async fn edit_complaint(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Complaint>, AppError> {
    let id = parse_id(&id)?;
    if !state.engine.capabilities(&caller, id).await?.edit {
        return Err(AppError::forbidden("Only the reporter may edit this complaint"));
    }

    let parsed = read_form(multipart, state.engine.evidence_store(), MAX_FILING_FILES).await?;
    let (edit, evidence) = parsed.into_edit()?;
    let complaint = state
        .engine
        .edit_complaint(&caller, id, edit, evidence)
        .await?;
    Ok(Json(complaint))
}

#[utoipa::path(
    post,
    path = "/api/complaints/{id}/withdraw",
    params(("id" = String, Path, description = "Complaint UUID")),
    request_body(content = WithdrawRequest, description = "Optional expected version"),
    responses(
        (status = 200, description = "Complaint withdrawn", body = Complaint),
        (status = 403, description = "Not the reporter", body = AppError),
        (status = 404, description = "Complaint not found", body = AppError),
        (status = 409, description = "No longer withdrawable or stale version", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller, body))]
pub async fn withdraw_complaint(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Complaint>, AppError> {
    let id = parse_id(&id)?;
    let request: WithdrawRequest = if body.iter().all(u8::is_ascii_whitespace) {
        WithdrawRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            AppError::validation(format!("Invalid withdraw body: {e}"), Default::default())
        })?
    };
    let expected_version = request.expected_version;
    let complaint = state
        .engine
        .withdraw_complaint(&caller, id, expected_version)
        .await?;
    Ok(Json(complaint))
}

/// GET /api/complaints/files/{evidence_id}
///
/// Streams an evidence file to any caller who may read the complaint that
/// references it.
#[utoipa::path(
    get,
    path = "/api/complaints/files/{evidence_id}",
    params(("evidence_id" = String, Path, description = "Evidence blob id")),
    responses(
        (status = 200, description = "File bytes"),
        (status = 403, description = "Not readable by the caller", body = AppError),
        (status = 404, description = "File not found", body = AppError),
        (status = 502, description = "Evidence store unavailable", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller))]
pub async fn serve_evidence(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(evidence_id): Path<String>,
) -> Result<Response, AppError> {
    let blob = state.engine.open_evidence(&caller, &evidence_id).await?;
    let meta = blob.meta.evidence;

    let content_disposition = format!(
        "inline; filename=\"{}\"",
        meta.filename.replace(['"', '\\'], "_")
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, meta.mimetype),
            (header::CONTENT_LENGTH, meta.size.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        Body::from_stream(blob.body),
    )
        .into_response())
}

/// GET /api/complaints/{id}/fir-pdf
///
/// First Information Report for anyone who may read the complaint.
#[utoipa::path(
    get,
    path = "/api/complaints/{id}/fir-pdf",
    params(("id" = String, Path, description = "Complaint UUID")),
    responses(
        (status = 200, description = "FIR PDF", content_type = "application/pdf"),
        (status = 403, description = "Not readable by the caller", body = AppError),
        (status = 404, description = "Complaint not found", body = AppError)
    ),
    tag = "complaints"
)]
#[tracing::instrument(skip(state, caller))]
pub async fn fir_pdf(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    render_fir(&state, &caller, id).await
}

/// Render the FIR of a complaint the caller may read.
pub(crate) async fn render_fir(
    state: &AppState,
    caller: &User,
    id: uuid::Uuid,
) -> Result<Response, AppError> {
    let complaint = state.engine.readable(caller, id).await?;
    let repo = state.engine.repo();

    let reporter = match complaint.reporter_id {
        Some(rid) => repo.find_user(rid).await?,
        None => None,
    };
    let officer = match complaint.assigned_officer_id {
        Some(oid) => repo.find_user(oid).await?,
        None => None,
    };

    let pdf = fir_report(&FirParams {
        complaint: &complaint,
        reporter: reporter.as_ref(),
        officer: officer.as_ref(),
        generated_at: Utc::now(),
    })
    .render()
    .await?;
    Ok(pdf_response(pdf, &format!("{}.pdf", complaint.case_number())))
}
