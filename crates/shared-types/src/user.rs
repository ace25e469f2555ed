use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PartySummary;

/// Portal role. Closed set; capability decisions match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Officer,
    Admin,
}

impl Role {
    /// Lowercase string for database / JWT storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Officer => "officer",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "officer" => Some(Role::Officer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A directory entry. Never serialized to clients directly; see [`UserProfile`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub national_id: String,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub password_hash: String,
    pub posting_site: Option<String>,
    pub badge_number: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_officer(&self) -> bool {
        self.role == Role::Officer
    }

    pub fn summary(&self) -> PartySummary {
        PartySummary {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            posting_site: self.posting_site.clone(),
            badge_number: self.badge_number.clone(),
        }
    }
}

/// A user as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserProfile {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub national_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posting_site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_number: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            national_id: user.national_id.clone(),
            address: user.address.clone(),
            gender: user.gender.clone(),
            date_of_birth: user.date_of_birth,
            posting_site: user.posting_site.clone(),
            badge_number: user.badge_number.clone(),
            verified: user.verified,
            created_at: user.created_at,
        }
    }
}

/// Inbox category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    CaseAssigned,
    CaseUpdate,
    AdminNote,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::CaseAssigned => "case_assigned",
            NotificationCategory::CaseUpdate => "case_update",
            NotificationCategory::AdminNote => "admin_note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "case_assigned" => Some(NotificationCategory::CaseAssigned),
            "case_update" => Some(NotificationCategory::CaseUpdate),
            "admin_note" => Some(NotificationCategory::AdminNote),
            _ => None,
        }
    }
}

/// One inbox entry. Independent of the complaint audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub category: NotificationCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complaint_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
