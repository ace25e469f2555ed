//! Complaint lifecycle engine.
//!
//! Owns every read and write of a complaint record. Each mutating operation
//! loads the record, checks the caller's capability and the state machine,
//! builds the next record, and commits it with a compare-and-swap on
//! `version`. Notifications go out only after the commit succeeds.

pub mod access;
pub mod assignment;
pub mod statistics;

use chrono::{Timelike, Utc};
use shared_types::{
    AppError, AuditEntry, AuthorKind, Complaint, ComplaintEdit, ComplaintFilter, ComplaintForm,
    ComplaintStatistics, ComplaintStatus, ComplaintView, EmergencyForm, EvidenceRef,
    Notification, NotificationCategory, Role, UpdateForm, User, parse_incident_date,
    parse_incident_time,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::notify::{dispatch, NotificationEvent, Notifier};
use crate::repo::{Appended, ComplaintScope, Repository};
use crate::storage::{EvidenceStore, StoredBlob};

use access::{capabilities_for, Capabilities};
use assignment::resolve_officer;

const STALE_VERSION: &str = "Complaint was modified by another request; reload and retry";

fn required(
    field: &'static str,
    value: Option<String>,
    errors: &mut BTreeMap<&'static str, String>,
) -> String {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            errors.insert(field, format!("{field} is required"));
            String::new()
        }
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn missing_fields(errors: BTreeMap<&'static str, String>) -> AppError {
    let names: Vec<&str> = errors.keys().copied().collect();
    let message = format!("Missing required fields: {}", names.join(", "));
    let field_errors: HashMap<String, String> = errors
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    AppError::validation(message, field_errors)
}

fn check_expected_version(complaint: &Complaint, expected: Option<i64>) -> Result<(), AppError> {
    match expected {
        Some(v) if v != complaint.version => Err(AppError::conflict(STALE_VERSION)),
        _ => Ok(()),
    }
}

/// The next revision of `current`, version and timestamp bumped.
fn next_revision(current: &Complaint) -> Complaint {
    let mut next = current.clone();
    next.version = current.version + 1;
    next.updated_at = Utc::now();
    next
}

#[derive(Clone)]
pub struct ComplaintEngine {
    repo: Arc<dyn Repository>,
    evidence: Arc<dyn EvidenceStore>,
    notifier: Arc<dyn Notifier>,
}

impl ComplaintEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        evidence: Arc<dyn EvidenceStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            evidence,
            notifier,
        }
    }

    pub fn repo(&self) -> &dyn Repository {
        self.repo.as_ref()
    }

    pub fn evidence_store(&self) -> &dyn EvidenceStore {
        self.evidence.as_ref()
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    // ── Callers ───────────────────────────────────────

    /// Current directory entry for an authenticated id.
    pub async fn load_caller(&self, id: Uuid) -> Result<User, AppError> {
        self.repo
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::auth_required("Account no longer exists"))
    }

    // ── Intake ────────────────────────────────────────

    /// File a complaint. `caller` may be absent only for anonymous filings.
    #[tracing::instrument(skip(self, form, evidence, caller), fields(anonymous = form.anonymous))]
    pub async fn file_complaint(
        &self,
        form: ComplaintForm,
        evidence: Vec<EvidenceRef>,
        caller: Option<&User>,
    ) -> Result<Complaint, AppError> {
        if !form.anonymous && caller.is_none() {
            return Err(AppError::auth_required(
                "Authentication required for non-anonymous reports",
            ));
        }

        let mut errors = BTreeMap::new();
        let complaint_type = required("type", form.complaint_type, &mut errors);
        let date = required("date", form.date, &mut errors);
        let time = required("time", form.time, &mut errors);
        let location = required("location", form.location, &mut errors);
        let description = required("description", form.description, &mut errors);
        if !errors.is_empty() {
            return Err(missing_fields(errors));
        }
        let incident_date = parse_incident_date("date", &date)?;
        let incident_time = parse_incident_time("time", &time)?;

        let reporter_id = if form.anonymous {
            None
        } else {
            caller.map(|u| u.id)
        };
        let now = Utc::now();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            reporter_id,
            anonymous: form.anonymous,
            emergency: false,
            complaint_type,
            incident_date,
            incident_time,
            location,
            nearest_landmark: optional(form.nearest_landmark),
            description,
            relation_to_victim: optional(form.relation_to_victim),
            victims: form.victims,
            accused: form.accused,
            evidence,
            status: ComplaintStatus::Submitted,
            assigned_officer_id: None,
            updates: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.create(complaint, if form.anonymous { None } else { caller }).await
    }

    /// File an emergency complaint: type, location and description only,
    /// incident date and time taken from the current clock.
    #[tracing::instrument(skip(self, form, evidence, caller), fields(caller = %caller.id))]
    pub async fn file_emergency_complaint(
        &self,
        form: EmergencyForm,
        evidence: Vec<EvidenceRef>,
        caller: &User,
    ) -> Result<Complaint, AppError> {
        let mut errors = BTreeMap::new();
        let complaint_type = required("type", form.complaint_type, &mut errors);
        let location = required("location", form.location, &mut errors);
        let description = required("description", form.description, &mut errors);
        if !errors.is_empty() {
            return Err(missing_fields(errors));
        }

        let now = Utc::now();
        let time = now.time();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            reporter_id: Some(caller.id),
            anonymous: false,
            emergency: true,
            complaint_type,
            incident_date: now.date_naive(),
            incident_time: time.with_nanosecond(0).unwrap_or(time),
            location,
            nearest_landmark: None,
            description,
            relation_to_victim: None,
            victims: Vec::new(),
            accused: Vec::new(),
            evidence,
            status: ComplaintStatus::Submitted,
            assigned_officer_id: None,
            updates: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.create(complaint, Some(caller)).await
    }

    async fn create(
        &self,
        mut complaint: Complaint,
        reporter: Option<&User>,
    ) -> Result<Complaint, AppError> {
        self.ensure_evidence_exists(&complaint.evidence).await?;

        let officer =
            resolve_officer(self.repo.as_ref(), &complaint.location, complaint.reporter_id)
                .await?;
        complaint.assigned_officer_id = officer.as_ref().map(|o| o.id);

        self.repo.insert_complaint(&complaint).await?;
        tracing::info!(
            complaint_id = %complaint.id,
            assigned = complaint.assigned_officer_id.is_some(),
            evidence = complaint.evidence.len(),
            "Complaint filed"
        );

        if let Some(reporter) = reporter {
            dispatch(
                self.notifier(),
                reporter.email.clone(),
                NotificationEvent::ComplaintFiled {
                    case_number: complaint.case_number(),
                    complaint_type: complaint.complaint_type.clone(),
                    emergency: complaint.emergency,
                },
            );
        }
        if let Some(officer) = &officer {
            self.announce_assignment(&complaint, officer).await;
        }

        Ok(complaint)
    }

    // ── Reads ─────────────────────────────────────────

    /// Role-scoped listing: reporters see their own non-anonymous complaints,
    /// officers see those assigned to them, admins see everything.
    #[tracing::instrument(skip(self, caller, filter), fields(caller = %caller.id))]
    pub async fn list_complaints(
        &self,
        caller: &User,
        filter: &ComplaintFilter,
    ) -> Result<Vec<ComplaintView>, AppError> {
        let scope = match caller.role {
            Role::User => ComplaintScope::ReportedBy(caller.id),
            Role::Officer => ComplaintScope::AssignedTo(caller.id),
            Role::Admin => ComplaintScope::All,
        };
        let complaints = self.repo.list_complaints(scope, filter).await?;
        self.views(caller, complaints).await
    }

    /// A single complaint, if the caller may read it.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn get_complaint(&self, caller: &User, id: Uuid) -> Result<ComplaintView, AppError> {
        let complaint = self.readable(caller, id).await?;
        let mut views = self.views(caller, vec![complaint]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::internal("Complaint view could not be built"))
    }

    /// Load a complaint the caller may read: `NotFound`, then `Forbidden`.
    pub async fn readable(&self, caller: &User, id: Uuid) -> Result<Complaint, AppError> {
        let complaint = self.find(id).await?;
        if !capabilities_for(caller, &complaint).read {
            return Err(AppError::forbidden("You do not have access to this complaint"));
        }
        Ok(complaint)
    }

    /// What the caller may do with a complaint right now. Lets the HTTP layer
    /// refuse an upload before any evidence is streamed to the store.
    pub async fn capabilities(&self, caller: &User, id: Uuid) -> Result<Capabilities, AppError> {
        let complaint = self.find(id).await?;
        Ok(capabilities_for(caller, &complaint))
    }

    /// Open an evidence blob referenced by a complaint the caller may read.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn open_evidence(
        &self,
        caller: &User,
        evidence_id: &str,
    ) -> Result<StoredBlob, AppError> {
        let complaint = self
            .repo
            .find_complaint_by_evidence(evidence_id)
            .await?
            .ok_or_else(|| AppError::not_found("File not found"))?;
        if !capabilities_for(caller, &complaint).read {
            return Err(AppError::forbidden("You do not have access to this file"));
        }
        self.evidence.retrieve(evidence_id).await?.ok_or_else(|| {
            tracing::error!(evidence_id, complaint_id = %complaint.id, "Referenced evidence blob is missing");
            AppError::storage("Evidence file is unavailable")
        })
    }

    /// Portal statistics for administrators.
    pub async fn statistics(&self) -> Result<ComplaintStatistics, AppError> {
        let facts = self.repo.complaint_facts().await?;
        let officers = self.repo.list_officers().await?;
        Ok(statistics::compute(&facts, &officers))
    }

    // ── Investigative updates ─────────────────────────

    /// Append an officer or admin update: a mandatory note, an optional
    /// forward status move and optional evidence, committed together.
    #[tracing::instrument(skip(self, caller, form, evidence), fields(caller = %caller.id))]
    pub async fn append_update(
        &self,
        caller: &User,
        id: Uuid,
        form: UpdateForm,
        evidence: Vec<EvidenceRef>,
    ) -> Result<Complaint, AppError> {
        let current = self.find(id).await?;
        if !capabilities_for(caller, &current).append_update {
            return Err(AppError::forbidden(
                "Only the assigned officer or an administrator may update this complaint",
            ));
        }

        let requested = match optional(form.status) {
            Some(raw) => Some(ComplaintStatus::parse(&raw).ok_or_else(|| {
                AppError::invalid_field("status", format!("Unknown status: {raw}"))
            })?),
            None => None,
        };
        let committed = self
            .commit_update(caller, current, form.note, requested, form.expected_version, evidence)
            .await?;

        if caller.role == Role::Admin {
            self.notify_officer_of_admin_note(&committed).await;
        }
        let reporter = match (committed.anonymous, committed.status) {
            (false, status) if status != ComplaintStatus::Withdrawn => committed.reporter_id,
            _ => None,
        };
        if let Some(reporter_id) = reporter {
            let latest = committed.updates.last();
            let note = latest.map(|u| u.note.clone()).unwrap_or_default();
            self.push_inbox(
                reporter_id,
                NotificationCategory::CaseUpdate,
                committed.id,
                format!("Update on case {}: {}", committed.case_number(), note),
            )
            .await;
            if let Some(reporter) = self.lookup(reporter_id).await {
                dispatch(
                    self.notifier(),
                    reporter.email,
                    NotificationEvent::ComplaintUpdated {
                        case_number: committed.case_number(),
                        status: committed.status.to_string(),
                        note,
                    },
                );
            }
        }

        Ok(committed)
    }

    /// Administrative note: an update with no status change that also lands
    /// in the assigned officer's inbox and mail.
    #[tracing::instrument(skip(self, caller, note), fields(caller = %caller.id))]
    pub async fn admin_note(
        &self,
        caller: &User,
        id: Uuid,
        note: String,
    ) -> Result<Complaint, AppError> {
        let current = self.find(id).await?;
        if !capabilities_for(caller, &current).admin_note {
            return Err(AppError::forbidden("Admin only"));
        }

        let committed = self
            .commit_update(caller, current, Some(note), None, None, Vec::new())
            .await?;

        self.notify_officer_of_admin_note(&committed).await;
        Ok(committed)
    }

    /// Inbox entry and mail for the assigned officer after an admin's note.
    async fn notify_officer_of_admin_note(&self, committed: &Complaint) {
        let Some(officer_id) = committed.assigned_officer_id else {
            return;
        };
        let note = committed
            .updates
            .last()
            .map(|u| u.note.clone())
            .unwrap_or_default();
        self.push_inbox(
            officer_id,
            NotificationCategory::AdminNote,
            committed.id,
            format!("Admin note on case {}: {}", committed.case_number(), note),
        )
        .await;
        if let Some(officer) = self.lookup(officer_id).await {
            dispatch(
                self.notifier(),
                officer.email,
                NotificationEvent::AdminNote {
                    case_number: committed.case_number(),
                    note,
                },
            );
        }
    }

    async fn commit_update(
        &self,
        caller: &User,
        current: Complaint,
        note: Option<String>,
        requested: Option<ComplaintStatus>,
        expected_version: Option<i64>,
        evidence: Vec<EvidenceRef>,
    ) -> Result<Complaint, AppError> {
        let note = optional(note)
            .ok_or_else(|| AppError::invalid_field("note", "note is required"))?;
        check_expected_version(&current, expected_version)?;

        let target = requested.unwrap_or(current.status);
        if target != current.status {
            current
                .status
                .check_investigative_transition(target)
                .map_err(|e| AppError::conflict(e.to_string()))?;
        }
        if current.status == ComplaintStatus::Withdrawn && !evidence.is_empty() {
            return Err(AppError::conflict(
                "Evidence cannot be added to a withdrawn complaint",
            ));
        }
        self.ensure_evidence_exists(&evidence).await?;

        let author_kind = match caller.role {
            Role::Admin => AuthorKind::Admin,
            _ => AuthorKind::Officer,
        };
        let mut next = next_revision(&current);
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            author_id: caller.id,
            author_kind,
            note,
            status: target,
            evidence: evidence.clone(),
            created_at: next.updated_at,
        };
        next.status = target;
        next.evidence.extend(evidence.iter().cloned());
        next.updates.push(entry.clone());

        let appended = Appended {
            evidence,
            update: Some(entry),
        };
        self.swap(&current, next, &appended).await
    }

    // ── Reporter changes ──────────────────────────────

    /// Reporter edit of substantive fields while the complaint is `Submitted`.
    /// A location change re-runs officer assignment.
    #[tracing::instrument(skip(self, caller, edit, evidence), fields(caller = %caller.id))]
    pub async fn edit_complaint(
        &self,
        caller: &User,
        id: Uuid,
        edit: ComplaintEdit,
        evidence: Vec<EvidenceRef>,
    ) -> Result<Complaint, AppError> {
        let current = self.find(id).await?;
        if !capabilities_for(caller, &current).edit {
            return Err(AppError::forbidden("Only the reporter may edit this complaint"));
        }
        if !current.status.allows_reporter_changes() {
            return Err(AppError::conflict(format!(
                "Complaint can no longer be edited (status is {})",
                current.status
            )));
        }
        check_expected_version(&current, edit.expected_version)?;
        if edit.is_empty() && evidence.is_empty() {
            return Err(AppError::validation("No changes supplied", HashMap::new()));
        }

        let mut next = next_revision(&current);
        let non_empty = |field: &str, value: String| -> Result<String, AppError> {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                Err(AppError::invalid_field(field, format!("{field} must not be empty")))
            } else {
                Ok(trimmed)
            }
        };
        if let Some(v) = edit.complaint_type {
            next.complaint_type = non_empty("type", v)?;
        }
        if let Some(v) = edit.description {
            next.description = non_empty("description", v)?;
        }
        if let Some(v) = edit.date {
            next.incident_date = parse_incident_date("date", &v)?;
        }
        if let Some(v) = edit.time {
            next.incident_time = parse_incident_time("time", &v)?;
        }
        if let Some(v) = edit.nearest_landmark {
            next.nearest_landmark = optional(Some(v));
        }
        if let Some(v) = edit.relation_to_victim {
            next.relation_to_victim = optional(Some(v));
        }
        if let Some(v) = edit.victims {
            next.victims = v;
        }
        if let Some(v) = edit.accused {
            next.accused = v;
        }

        let mut newly_assigned = None;
        if let Some(v) = edit.location {
            let location = non_empty("location", v)?;
            if location != current.location {
                let officer =
                    resolve_officer(self.repo.as_ref(), &location, current.reporter_id).await?;
                next.assigned_officer_id = officer.as_ref().map(|o| o.id);
                if next.assigned_officer_id != current.assigned_officer_id {
                    newly_assigned = officer;
                }
            }
            next.location = location;
        }

        self.ensure_evidence_exists(&evidence).await?;
        next.evidence.extend(evidence.iter().cloned());

        let appended = Appended {
            evidence,
            update: None,
        };
        let committed = self.swap(&current, next, &appended).await?;

        if let Some(officer) = &newly_assigned {
            self.announce_assignment(&committed, officer).await;
        }
        Ok(committed)
    }

    /// Reporter withdrawal while the complaint is `Submitted`.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn withdraw_complaint(
        &self,
        caller: &User,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<Complaint, AppError> {
        let current = self.find(id).await?;
        if !capabilities_for(caller, &current).withdraw {
            return Err(AppError::forbidden("Only the reporter may withdraw this complaint"));
        }
        current
            .status
            .check_withdrawal()
            .map_err(|e| AppError::conflict(e.to_string()))?;
        check_expected_version(&current, expected_version)?;

        let mut next = next_revision(&current);
        next.status = ComplaintStatus::Withdrawn;
        self.swap(&current, next, &Appended::default()).await
    }

    // ── Accounts ──────────────────────────────────────

    /// Remove an account: its complaints first, then the identity.
    /// Complaints assigned to the account are unlinked.
    #[tracing::instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn delete_account(&self, caller: &User) -> Result<u64, AppError> {
        let removed = self.repo.delete_user_cascade(caller.id).await?;
        tracing::info!(user_id = %caller.id, complaints_removed = removed, "Account deleted");
        Ok(removed)
    }

    // ── Internals ─────────────────────────────────────

    async fn find(&self, id: Uuid) -> Result<Complaint, AppError> {
        self.repo
            .find_complaint(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Complaint {} not found", id)))
    }

    async fn swap(
        &self,
        current: &Complaint,
        next: Complaint,
        appended: &Appended,
    ) -> Result<Complaint, AppError> {
        if self
            .repo
            .update_complaint(&next, current.version, appended)
            .await?
        {
            tracing::info!(
                complaint_id = %next.id,
                version = next.version,
                status = %next.status,
                "Complaint updated"
            );
            Ok(next)
        } else {
            tracing::warn!(complaint_id = %next.id, expected = current.version, "Stale complaint write rejected");
            Err(AppError::conflict(STALE_VERSION))
        }
    }

    async fn ensure_evidence_exists(&self, evidence: &[EvidenceRef]) -> Result<(), AppError> {
        for item in evidence {
            if !self.evidence.exists(&item.id).await? {
                return Err(AppError::storage(format!(
                    "Evidence file {} was not stored",
                    item.filename
                )));
            }
        }
        Ok(())
    }

    async fn announce_assignment(&self, complaint: &Complaint, officer: &User) {
        let label = if complaint.emergency {
            "Emergency case"
        } else {
            "New case"
        };
        self.push_inbox(
            officer.id,
            NotificationCategory::CaseAssigned,
            complaint.id,
            format!(
                "{label} {} assigned to you: {} at {}",
                complaint.case_number(),
                complaint.complaint_type,
                complaint.location
            ),
        )
        .await;
        dispatch(
            self.notifier(),
            officer.email.clone(),
            NotificationEvent::CaseAssigned {
                case_number: complaint.case_number(),
                complaint_type: complaint.complaint_type.clone(),
                location: complaint.location.clone(),
                description: complaint.description.clone(),
                emergency: complaint.emergency,
            },
        );
    }

    /// Inbox writes happen after the complaint commit and never fail it.
    async fn push_inbox(
        &self,
        user_id: Uuid,
        category: NotificationCategory,
        complaint_id: Uuid,
        message: String,
    ) {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            message,
            category,
            complaint_id: Some(complaint_id),
            read: false,
            created_at: Utc::now(),
        };
        if let Err(e) = self.repo.push_notification(&notification).await {
            tracing::warn!(error = %e, %user_id, "Failed to write inbox notification");
        }
    }

    async fn lookup(&self, id: Uuid) -> Option<User> {
        match self.repo.find_user(id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %id, "Notification recipient lookup failed");
                None
            }
        }
    }

    /// Attach the parties each role may see: reporters see their officer,
    /// officers see the reporter, admins see both.
    async fn views(
        &self,
        caller: &User,
        complaints: Vec<Complaint>,
    ) -> Result<Vec<ComplaintView>, AppError> {
        let show_reporter = caller.role != Role::User;
        let show_officer = caller.role != Role::Officer;

        let mut ids: Vec<Uuid> = Vec::new();
        for c in &complaints {
            if show_reporter {
                ids.extend(c.reporter_id.filter(|_| !c.anonymous));
            }
            if show_officer {
                ids.extend(c.assigned_officer_id);
            }
        }
        ids.sort();
        ids.dedup();
        let parties: HashMap<Uuid, User> = self
            .repo
            .find_users(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(complaints
            .into_iter()
            .map(|complaint| {
                let reporter = complaint
                    .reporter_id
                    .filter(|_| show_reporter && !complaint.anonymous)
                    .and_then(|id| parties.get(&id))
                    .map(User::summary);
                let assigned_officer = complaint
                    .assigned_officer_id
                    .filter(|_| show_officer)
                    .and_then(|id| parties.get(&id))
                    .map(User::summary);
                ComplaintView {
                    complaint,
                    reporter,
                    assigned_officer,
                }
            })
            .collect())
    }
}
