use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AppError, UserProfile};

#[cfg(feature = "validation")]
use validator::{Validate, ValidationError};

// ── Field rules ───────────────────────────────────────

/// Letters and spaces only, at least one letter.
pub fn is_valid_full_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(|c| c.is_alphabetic() || c == ' ')
}

/// Exactly ten ASCII digits.
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit())
}

/// Exactly twelve ASCII digits.
pub fn is_valid_national_id(id: &str) -> bool {
    id.len() == 12 && id.bytes().all(|b| b.is_ascii_digit())
}

/// At least eight characters with an upper, a lower, a digit and a symbol.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

#[cfg(feature = "validation")]
fn rule(ok: bool, code: &'static str, message: &'static str) -> Result<(), ValidationError> {
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new(code);
        err.message = Some(message.into());
        Err(err)
    }
}

#[cfg(feature = "validation")]
fn validate_full_name(value: &str) -> Result<(), ValidationError> {
    rule(
        is_valid_full_name(value),
        "full_name",
        "Name may contain only letters and spaces",
    )
}

#[cfg(feature = "validation")]
fn validate_phone(value: &str) -> Result<(), ValidationError> {
    rule(is_valid_phone(value), "phone", "Phone number must be 10 digits")
}

#[cfg(feature = "validation")]
fn validate_national_id(value: &str) -> Result<(), ValidationError> {
    rule(
        is_valid_national_id(value),
        "national_id",
        "National ID must be 12 digits",
    )
}

#[cfg(feature = "validation")]
fn validate_password(value: &str) -> Result<(), ValidationError> {
    rule(
        is_strong_password(value),
        "password",
        "Password must be at least 8 characters with upper, lower, digit and symbol",
    )
}

// ── Auth ──────────────────────────────────────────────

/// Request a one-time code by email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct SendOtpRequest {
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Valid email is required"))
    )]
    pub email: String,
}

/// Verify a one-time code previously sent to `email`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct VerifyOtpRequest {
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Valid email is required"))
    )]
    pub email: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(equal = 6, message = "Code must be 6 digits"))
    )]
    pub otp: String,
}

/// Self-registration of a citizen account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct RegisterRequest {
    #[cfg_attr(feature = "validation", validate(custom(function = "validate_full_name")))]
    pub full_name: String,
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Valid email is required"))
    )]
    pub email: String,
    #[cfg_attr(feature = "validation", validate(custom(function = "validate_phone")))]
    pub phone: String,
    #[cfg_attr(feature = "validation", validate(custom(function = "validate_national_id")))]
    pub national_id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[cfg_attr(feature = "validation", validate(custom(function = "validate_password")))]
    pub password: String,
    #[cfg_attr(
        feature = "validation",
        validate(must_match(other = "password", message = "Passwords do not match"))
    )]
    pub confirm_password: String,
}

/// Login request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct LoginRequest {
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Valid email is required"))
    )]
    pub email: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Password is required"))
    )]
    pub password: String,
}

/// Issued credential plus the caller's profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ── Profile ───────────────────────────────────────────

/// Self-service profile update. Absent fields are left unchanged.
///
/// `posting_site` and `badge_number` are honoured for officers only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub posting_site: Option<String>,
    #[serde(default)]
    pub badge_number: Option<String>,
}

impl UpdateProfileRequest {
    /// Apply the same field rules as registration to whichever fields are present.
    pub fn check(&self) -> Result<(), AppError> {
        if let Some(name) = &self.full_name {
            if !is_valid_full_name(name) {
                return Err(AppError::invalid_field(
                    "full_name",
                    "Name may contain only letters and spaces",
                ));
            }
        }
        if let Some(phone) = &self.phone {
            if !is_valid_phone(phone) {
                return Err(AppError::invalid_field(
                    "phone",
                    "Phone number must be 10 digits",
                ));
            }
        }
        for (field, value) in [
            ("posting_site", &self.posting_site),
            ("badge_number", &self.badge_number),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(AppError::invalid_field(
                    field,
                    format!("{field} cannot be empty"),
                ));
            }
        }
        Ok(())
    }
}

// ── Admin ─────────────────────────────────────────────

/// Provision an officer account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct CreateOfficerRequest {
    #[cfg_attr(feature = "validation", validate(custom(function = "validate_full_name")))]
    pub full_name: String,
    #[cfg_attr(
        feature = "validation",
        validate(email(message = "Valid email is required"))
    )]
    pub email: String,
    #[cfg_attr(feature = "validation", validate(custom(function = "validate_phone")))]
    pub phone: String,
    #[cfg_attr(feature = "validation", validate(custom(function = "validate_national_id")))]
    pub national_id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Posting site is required"))
    )]
    pub posting_site: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Badge number is required"))
    )]
    pub badge_number: String,
}
