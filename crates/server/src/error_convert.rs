//! Mapping of storage and validation failures onto [`AppError`].

use shared_types::AppError;

const UNIQUE_VIOLATION: &str = "23505";

/// Unique indexes a caller can trip, with the message they see.
const UNIQUE_CONSTRAINTS: &[(&str, &str)] = &[
    ("users_email_key", "An account with this email already exists"),
    ("users_badge_number_key", "This badge number is already registered"),
    ("complaints_pkey", "Complaint already exists"),
    (
        "complaint_updates_complaint_id_seq_key",
        "Complaint was modified by another request; reload and retry",
    ),
];

/// Translate a sqlx failure. Unique violations become `Conflict`; anything
/// else is logged here and reported without driver detail.
pub fn db_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::RowNotFound = err {
        return AppError::not_found("Record not found");
    }
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let constraint = db_err.constraint().unwrap_or_default();
            let message = UNIQUE_CONSTRAINTS
                .iter()
                .find(|(name, _)| *name == constraint)
                .map_or("A record with this value already exists", |(_, msg)| *msg);
            return AppError::conflict(message);
        }
    }
    tracing::error!(error = %err, "Database error");
    AppError::database("Database operation failed")
}

/// `.or_db()` on any sqlx result.
pub trait DbResultExt<T> {
    fn or_db(self) -> Result<T, AppError>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn or_db(self) -> Result<T, AppError> {
        self.map_err(db_error)
    }
}

/// Run `validator` rules on a request body, reporting every failing field.
pub trait ValidateRequest {
    fn validate_request(&self) -> Result<(), AppError>;
}

impl<T: validator::Validate> ValidateRequest for T {
    fn validate_request(&self) -> Result<(), AppError> {
        self.validate().map_err(AppError::from)
    }
}
