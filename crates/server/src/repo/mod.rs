//! Persistence seam between the lifecycle engine and storage.
//!
//! Every complaint mutation is a compare-and-swap on `version`: the caller
//! passes the version it read, and `Ok(false)` means someone else wrote first.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use shared_types::{
    AppError, AuditEntry, Complaint, ComplaintFilter, ComplaintStatus, EvidenceRef, Notification,
    User,
};
use uuid::Uuid;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Which complaints a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintScope {
    All,
    ReportedBy(Uuid),
    AssignedTo(Uuid),
}

impl ComplaintScope {
    pub fn admits(&self, complaint: &Complaint) -> bool {
        match self {
            ComplaintScope::All => true,
            ComplaintScope::ReportedBy(id) => {
                !complaint.anonymous && complaint.reporter_id == Some(*id)
            }
            ComplaintScope::AssignedTo(id) => complaint.assigned_officer_id == Some(*id),
        }
    }
}

/// Rows appended alongside a complaint write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Appended {
    /// New record-level evidence, already included at the tail of `Complaint::evidence`.
    pub evidence: Vec<EvidenceRef>,
    /// New audit entry, already the last element of `Complaint::updates`.
    pub update: Option<AuditEntry>,
}

/// The three columns statistics are computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplaintFact {
    pub complaint_type: String,
    pub status: ComplaintStatus,
    pub assigned_officer_id: Option<Uuid>,
}

impl From<&Complaint> for ComplaintFact {
    fn from(c: &Complaint) -> Self {
        Self {
            complaint_type: c.complaint_type.clone(),
            status: c.status,
            assigned_officer_id: c.assigned_officer_id,
        }
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;

    /// Cheap round trip proving the backend is reachable.
    async fn ping(&self) -> Result<(), AppError>;

    // ── Identity directory ────────────────────────────

    /// `Conflict` when the email or badge number is taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Case-insensitive.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError>;

    /// All officers, oldest first.
    async fn list_officers(&self) -> Result<Vec<User>, AppError>;

    /// Verified officers whose posting site equals `site` exactly,
    /// ordered by `created_at` then id.
    async fn verified_officers_at(&self, site: &str) -> Result<Vec<User>, AppError>;

    /// Overwrite the mutable profile columns and role. `Conflict` on a taken badge.
    async fn update_user(&self, user: &User) -> Result<(), AppError>;

    /// Delete the user's complaints, unlink complaints assigned to them, then
    /// delete the user, all in one transaction. Returns complaints removed.
    async fn delete_user_cascade(&self, id: Uuid) -> Result<u64, AppError>;

    // ── Complaints ────────────────────────────────────

    async fn insert_complaint(&self, complaint: &Complaint) -> Result<(), AppError>;

    async fn find_complaint(&self, id: Uuid) -> Result<Option<Complaint>, AppError>;

    async fn list_complaints(
        &self,
        scope: ComplaintScope,
        filter: &ComplaintFilter,
    ) -> Result<Vec<Complaint>, AppError>;

    /// The complaint referencing `evidence_id` anywhere in its record.
    async fn find_complaint_by_evidence(
        &self,
        evidence_id: &str,
    ) -> Result<Option<Complaint>, AppError>;

    /// Replace the stored record with `next` if its version is still
    /// `expected_version`. `next.version` must be `expected_version + 1`.
    async fn update_complaint(
        &self,
        next: &Complaint,
        expected_version: i64,
        appended: &Appended,
    ) -> Result<bool, AppError>;

    async fn complaint_facts(&self) -> Result<Vec<ComplaintFact>, AppError>;

    // ── Inbox ─────────────────────────────────────────

    async fn push_notification(&self, notification: &Notification) -> Result<(), AppError>;

    /// Newest first.
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, AppError>;

    /// `Ok(false)` when no such notification belongs to `user_id`.
    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;
}

/// Order `a` before `b` by creation time, then id. Used by both backends.
pub fn creation_order(a: &Complaint, b: &Complaint) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}
