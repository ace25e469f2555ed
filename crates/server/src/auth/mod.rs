pub mod extractors;
pub mod jwt;
pub mod middleware;
pub mod otp;
pub mod password;

/// Check if `email` matches the configured bootstrap admin address
/// (case-insensitive). `None` never matches.
pub fn is_admin_email(admin_email: Option<&str>, email: &str) -> bool {
    match admin_email {
        Some(admin) if !admin.is_empty() => admin.eq_ignore_ascii_case(email.trim()),
        _ => false,
    }
}
