use async_trait::async_trait;
use shared_types::{AppError, Complaint, ComplaintFilter, Notification, Role, SortOrder, User};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{creation_order, Appended, ComplaintFact, ComplaintScope, Repository};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    complaints: HashMap<Uuid, Complaint>,
    notifications: HashMap<Uuid, Vec<Notification>>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn badge_taken(&self, badge: Option<&str>, except: Option<Uuid>) -> bool {
        let Some(badge) = badge else {
            return false;
        };
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.badge_number.as_deref() == Some(badge))
    }
}

/// In-memory repository.
///
/// A single lock guards every map so multi-step operations (cascade delete,
/// compare-and-swap) are atomic. Used by tests and when no database is set.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email, None) {
            return Err(AppError::conflict("An account with this email already exists"));
        }
        if state.badge_taken(user.badge_number.as_deref(), None) {
            return Err(AppError::conflict("This badge number is already registered"));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn list_officers(&self) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        let mut officers: Vec<User> = state
            .users
            .values()
            .filter(|u| u.role == Role::Officer)
            .cloned()
            .collect();
        officers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(officers)
    }

    async fn verified_officers_at(&self, site: &str) -> Result<Vec<User>, AppError> {
        let mut officers = self.list_officers().await?;
        officers.retain(|u| u.verified && u.posting_site.as_deref() == Some(site));
        Ok(officers)
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user.id) {
            return Err(AppError::not_found("User not found"));
        }
        if state.badge_taken(user.badge_number.as_deref(), Some(user.id)) {
            return Err(AppError::conflict("This badge number is already registered"));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user_cascade(&self, id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(AppError::not_found("User not found"));
        }

        let before = state.complaints.len();
        state.complaints.retain(|_, c| c.reporter_id != Some(id));
        let removed = (before - state.complaints.len()) as u64;

        let now = chrono::Utc::now();
        for complaint in state.complaints.values_mut() {
            if complaint.assigned_officer_id == Some(id) {
                complaint.assigned_officer_id = None;
                complaint.version += 1;
                complaint.updated_at = now;
            }
        }

        state.notifications.remove(&id);
        state.users.remove(&id);
        Ok(removed)
    }

    async fn insert_complaint(&self, complaint: &Complaint) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.complaints.contains_key(&complaint.id) {
            return Err(AppError::conflict("Complaint already exists"));
        }
        state.complaints.insert(complaint.id, complaint.clone());
        Ok(())
    }

    async fn find_complaint(&self, id: Uuid) -> Result<Option<Complaint>, AppError> {
        Ok(self.state.read().await.complaints.get(&id).cloned())
    }

    async fn list_complaints(
        &self,
        scope: ComplaintScope,
        filter: &ComplaintFilter,
    ) -> Result<Vec<Complaint>, AppError> {
        let state = self.state.read().await;
        let mut complaints: Vec<Complaint> = state
            .complaints
            .values()
            .filter(|c| scope.admits(c) && filter.matches(c))
            .cloned()
            .collect();
        complaints.sort_by(creation_order);
        if filter.sort == SortOrder::Recent {
            complaints.reverse();
        }
        Ok(complaints)
    }

    async fn find_complaint_by_evidence(
        &self,
        evidence_id: &str,
    ) -> Result<Option<Complaint>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .complaints
            .values()
            .find(|c| c.evidence_ids().any(|id| id == evidence_id))
            .cloned())
    }

    async fn update_complaint(
        &self,
        next: &Complaint,
        expected_version: i64,
        _appended: &Appended,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let Some(current) = state.complaints.get_mut(&next.id) else {
            return Err(AppError::not_found("Complaint not found"));
        };
        if current.version != expected_version {
            return Ok(false);
        }
        *current = next.clone();
        Ok(true)
    }

    async fn complaint_facts(&self) -> Result<Vec<ComplaintFact>, AppError> {
        let state = self.state.read().await;
        Ok(state.complaints.values().map(ComplaintFact::from).collect())
    }

    async fn push_notification(&self, notification: &Notification) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&notification.user_id) {
            return Err(AppError::not_found("Recipient not found"));
        }
        state
            .notifications
            .entry(notification.user_id)
            .or_default()
            .push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, AppError> {
        let state = self.state.read().await;
        let mut inbox = state.notifications.get(&user_id).cloned().unwrap_or_default();
        inbox.reverse();
        Ok(inbox)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let found = state
            .notifications
            .get_mut(&user_id)
            .and_then(|inbox| inbox.iter_mut().find(|n| n.id == id))
            .map(|n| n.read = true)
            .is_some();
        Ok(found)
    }
}
