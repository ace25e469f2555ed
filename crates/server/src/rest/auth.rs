use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use shared_types::{
    AppError, AuthResponse, LoginRequest, MessageResponse, RegisterRequest, Role, SendOtpRequest,
    User, UserProfile, VerifyOtpRequest,
};
use uuid::Uuid;

use crate::auth::{is_admin_email, otp::OtpCheck, password as pw};
use crate::db::AppState;
use crate::error_convert::ValidateRequest;
use crate::notify::{dispatch, NotificationEvent};

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn issue(state: &AppState, user: &User) -> Result<AuthResponse, AppError> {
    let token = state.jwt.create_access_token(user.id, &user.email, user.role)?;
    Ok(AuthResponse {
        token,
        user: UserProfile::from(user),
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 422, description = "Validation error", body = AppError),
        (status = 429, description = "Rate limited", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate_request()?;

    let email = payload.email.trim().to_lowercase();
    let code = state.otp.issue(&email);
    dispatch(state.engine.notifier(), email, NotificationEvent::Otp { code });

    Ok(Json(MessageResponse::new("OTP sent successfully")))
}

/// POST /api/auth/verify-otp
///
/// A matching code is consumed. If an account already exists for the address
/// it is marked verified.
#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code verified", body = MessageResponse),
        (status = 422, description = "Wrong, expired or unknown code", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate_request()?;

    match state.otp.verify(&payload.email, &payload.otp) {
        OtpCheck::Verified => {}
        OtpCheck::Mismatch => return Err(AppError::invalid_field("otp", "Invalid OTP")),
        OtpCheck::Missing => {
            return Err(AppError::invalid_field("otp", "OTP expired or not found"))
        }
    }

    let repo = state.engine.repo();
    if let Some(mut user) = repo.find_user_by_email(&payload.email).await? {
        if !user.verified {
            user.verified = true;
            repo.update_user(&user).await?;
        }
    }

    Ok(Json(MessageResponse::new("OTP verified successfully")))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 409, description = "Email already registered", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.validate_request()?;

    let repo = state.engine.repo();
    let email = payload.email.trim().to_lowercase();
    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("An account with this email already exists"));
    }

    let user = User {
        id: Uuid::new_v4(),
        role: Role::User,
        full_name: payload.full_name.trim().to_string(),
        email,
        phone: payload.phone,
        national_id: payload.national_id,
        address: optional(payload.address),
        gender: optional(payload.gender),
        date_of_birth: payload.date_of_birth,
        password_hash: pw::hash_password(&payload.password)?,
        posting_site: None,
        badge_number: None,
        verified: false,
        created_at: Utc::now(),
    };
    repo.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, "Account registered");

    Ok((StatusCode::CREATED, Json(issue(&state, &user)?)))
}

/// POST /api/auth/login
///
/// Logging in with the configured `ADMIN_EMAIL` promotes the account to admin.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate_request()?;

    let invalid = || AppError::auth_required("Invalid email or password");
    let repo = state.engine.repo();
    let mut user = repo
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(invalid)?;
    if !pw::verify_password(&payload.password, &user.password_hash)? {
        return Err(invalid());
    }

    if user.role != Role::Admin
        && is_admin_email(state.settings.admin_email.as_deref(), &user.email)
    {
        user.role = Role::Admin;
        repo.update_user(&user).await?;
        tracing::info!(user_id = %user.id, "Promoted bootstrap admin");
    }

    Ok(Json(issue(&state, &user)?))
}
