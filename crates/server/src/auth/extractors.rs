//! Request extractors for the caller's identity.
//!
//! A token only proves an account id. Every extractor here that yields a
//! [`User`] reloads it from the directory, so role changes and deletions
//! take effect on the very next request.

use axum::{extract::FromRequestParts, http::request::Parts};
use shared_types::{AppError, Role, User};

use super::jwt::Claims;
use crate::db::AppState;

fn claims(parts: &Parts) -> Option<Claims> {
    parts.extensions.get::<Claims>().cloned()
}

/// The authenticated caller. 401 without a valid token or once the account
/// is gone.
pub struct Caller(pub User);

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims =
            claims(parts).ok_or_else(|| AppError::auth_required("Authentication required"))?;
        Ok(Caller(state.engine.load_caller(claims.sub).await?))
    }
}

/// The caller if a token was presented. A token for a deleted account is
/// still rejected rather than treated as anonymous.
pub struct MaybeCaller(pub Option<User>);

impl FromRequestParts<AppState> for MaybeCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match claims(parts) {
            Some(claims) => Ok(MaybeCaller(Some(state.engine.load_caller(claims.sub).await?))),
            None => Ok(MaybeCaller(None)),
        }
    }
}

/// An authenticated administrator. 403 for any other role.
pub struct AdminCaller(pub User);

impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Caller(user) = Caller::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::forbidden("Admin only"));
        }
        Ok(AdminCaller(user))
    }
}
