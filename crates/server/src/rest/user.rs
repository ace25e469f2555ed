use axum::{
    extract::{Path, State},
    Json,
};
use shared_types::{
    AppError, MessageResponse, Notification, Role, UpdateProfileRequest, UserProfile,
};

use super::parse_id;
use crate::auth::extractors::Caller;
use crate::db::AppState;

fn trimmed(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Caller profile", body = UserProfile),
        (status = 401, description = "Authentication required", body = AppError)
    ),
    tag = "users"
)]
#[tracing::instrument(skip(user), fields(user = %user.id))]
pub async fn get_me(Caller(user): Caller) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(UserProfile::from(&user)))
}

/// PUT /api/users/me
///
/// Posting site and badge number are honoured for officers only.
#[utoipa::path(
    put,
    path = "/api/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserProfile),
        (status = 409, description = "Badge number already registered", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "users"
)]
#[tracing::instrument(skip(state, user, payload), fields(user = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    Caller(mut user): Caller,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    payload.check()?;

    if let Some(name) = payload.full_name {
        user.full_name = name.trim().to_string();
    }
    if let Some(phone) = payload.phone {
        user.phone = phone;
    }
    if let Some(address) = payload.address {
        user.address = trimmed(address);
    }
    if let Some(gender) = payload.gender {
        user.gender = trimmed(gender);
    }
    if payload.date_of_birth.is_some() {
        user.date_of_birth = payload.date_of_birth;
    }
    if user.role == Role::Officer {
        if let Some(site) = payload.posting_site {
            user.posting_site = trimmed(site);
        }
        if let Some(badge) = payload.badge_number {
            user.badge_number = trimmed(badge);
        }
    }

    state.engine.repo().update_user(&user).await?;
    Ok(Json(UserProfile::from(&user)))
}

/// DELETE /api/users/me
///
/// Deletes the caller's complaints, then the account. Cases assigned to an
/// officer being deleted become unassigned.
#[utoipa::path(
    delete,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Authentication required", body = AppError)
    ),
    tag = "users"
)]
#[tracing::instrument(skip(state, user), fields(user = %user.id))]
pub async fn delete_me(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = state.engine.delete_account(&user).await?;
    Ok(Json(MessageResponse::new(format!(
        "Account deleted along with {removed} complaint(s)"
    ))))
}

#[utoipa::path(
    get,
    path = "/api/users/me/notifications",
    responses(
        (status = 200, description = "Inbox, newest first", body = Vec<Notification>),
        (status = 401, description = "Authentication required", body = AppError)
    ),
    tag = "users"
)]
#[tracing::instrument(skip(state, user), fields(user = %user.id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.engine.repo().list_notifications(user.id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/me/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification UUID")),
    responses(
        (status = 200, description = "Marked read", body = MessageResponse),
        (status = 404, description = "Not in the caller's inbox", body = AppError)
    ),
    tag = "users"
)]
#[tracing::instrument(skip(state, user), fields(user = %user.id))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    if !state.engine.repo().mark_notification_read(user.id, id).await? {
        return Err(AppError::not_found("Notification not found"));
    }
    Ok(Json(MessageResponse::new("Notification marked as read")))
}
