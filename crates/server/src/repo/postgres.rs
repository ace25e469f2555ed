use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use shared_types::{
    Accused, AppError, AuditEntry, AuthorKind, Complaint, ComplaintFilter, ComplaintStatus,
    EvidenceRef, Notification, NotificationCategory, Role, SortOrder, User, Victim,
};
use sqlx::types::Json;
use sqlx::{FromRow, Pool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Appended, ComplaintFact, ComplaintScope, Repository};
use crate::error_convert::DbResultExt;

// ── Row types ─────────────────────────────────────────

const USER_COLUMNS: &str = "id, role, full_name, email, phone, national_id, address, gender, \
     date_of_birth, password_hash, posting_site, badge_number, verified, created_at";

const COMPLAINT_COLUMNS: &str = "id, reporter_id, anonymous, emergency, complaint_type, \
     incident_date, incident_time, location, nearest_landmark, description, relation_to_victim, \
     victims, accused, status, assigned_officer_id, version, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    role: String,
    full_name: String,
    email: String,
    phone: String,
    national_id: String,
    address: Option<String>,
    gender: Option<String>,
    date_of_birth: Option<NaiveDate>,
    password_hash: String,
    posting_site: Option<String>,
    badge_number: Option<String>,
    verified: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| AppError::database(format!("Unknown role in users table: {}", row.role)))?;
        Ok(User {
            id: row.id,
            role,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            national_id: row.national_id,
            address: row.address,
            gender: row.gender,
            date_of_birth: row.date_of_birth,
            password_hash: row.password_hash,
            posting_site: row.posting_site,
            badge_number: row.badge_number,
            verified: row.verified,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ComplaintRow {
    id: Uuid,
    reporter_id: Option<Uuid>,
    anonymous: bool,
    emergency: bool,
    complaint_type: String,
    incident_date: NaiveDate,
    incident_time: NaiveTime,
    location: String,
    nearest_landmark: Option<String>,
    description: String,
    relation_to_victim: Option<String>,
    victims: Json<Vec<Victim>>,
    accused: Json<Vec<Accused>>,
    status: String,
    assigned_officer_id: Option<Uuid>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct UpdateRow {
    id: Uuid,
    complaint_id: Uuid,
    author_id: Uuid,
    author_kind: String,
    note: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct EvidenceRow {
    complaint_id: Uuid,
    update_id: Option<Uuid>,
    evidence_id: String,
    filename: String,
    size: i64,
    mimetype: String,
}

impl EvidenceRow {
    fn into_ref(self) -> EvidenceRef {
        EvidenceRef {
            id: self.evidence_id,
            filename: self.filename,
            size: self.size,
            mimetype: self.mimetype,
        }
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    message: String,
    category: String,
    complaint_id: Option<Uuid>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let category = NotificationCategory::parse(&row.category).ok_or_else(|| {
            AppError::database(format!("Unknown notification category: {}", row.category))
        })?;
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            message: row.message,
            category,
            complaint_id: row.complaint_id,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct FactRow {
    complaint_type: String,
    status: String,
    assigned_officer_id: Option<Uuid>,
}

fn parse_status(raw: &str) -> Result<ComplaintStatus, AppError> {
    ComplaintStatus::parse(raw)
        .ok_or_else(|| AppError::database(format!("Unknown complaint status: {raw}")))
}

// ── Repository ────────────────────────────────────────

/// PostgreSQL repository.
///
/// Audit entries and evidence references live in insert-only child tables;
/// a complaint is reassembled from the three tables on read.
#[derive(Clone)]
pub struct PgRepository {
    pool: Pool<Postgres>,
}

impl PgRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Attach audit trails and evidence to bare complaint rows, preserving order.
    async fn hydrate(&self, rows: Vec<ComplaintRow>) -> Result<Vec<Complaint>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let update_rows = sqlx::query_as::<_, UpdateRow>(
            "SELECT id, complaint_id, author_id, author_kind, note, status, created_at \
             FROM complaint_updates WHERE complaint_id = ANY($1) ORDER BY complaint_id, seq",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .or_db()?;

        let evidence_rows = sqlx::query_as::<_, EvidenceRow>(
            "SELECT complaint_id, update_id, evidence_id, filename, size, mimetype \
             FROM complaint_evidence WHERE complaint_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .or_db()?;

        let mut record_evidence: HashMap<Uuid, Vec<EvidenceRef>> = HashMap::new();
        let mut entry_evidence: HashMap<Uuid, Vec<EvidenceRef>> = HashMap::new();
        for row in evidence_rows {
            match row.update_id {
                Some(update_id) => entry_evidence.entry(update_id).or_default().push(row.into_ref()),
                None => record_evidence
                    .entry(row.complaint_id)
                    .or_default()
                    .push(row.into_ref()),
            }
        }

        let mut trails: HashMap<Uuid, Vec<AuditEntry>> = HashMap::new();
        for row in update_rows {
            let author_kind = AuthorKind::parse(&row.author_kind).ok_or_else(|| {
                AppError::database(format!("Unknown author kind: {}", row.author_kind))
            })?;
            trails.entry(row.complaint_id).or_default().push(AuditEntry {
                id: row.id,
                author_id: row.author_id,
                author_kind,
                note: row.note,
                status: parse_status(&row.status)?,
                evidence: entry_evidence.remove(&row.id).unwrap_or_default(),
                created_at: row.created_at,
            });
        }

        rows.into_iter()
            .map(|row| {
                Ok(Complaint {
                    id: row.id,
                    reporter_id: row.reporter_id,
                    anonymous: row.anonymous,
                    emergency: row.emergency,
                    complaint_type: row.complaint_type,
                    incident_date: row.incident_date,
                    incident_time: row.incident_time,
                    location: row.location,
                    nearest_landmark: row.nearest_landmark,
                    description: row.description,
                    relation_to_victim: row.relation_to_victim,
                    victims: row.victims.0,
                    accused: row.accused.0,
                    evidence: record_evidence.remove(&row.id).unwrap_or_default(),
                    status: parse_status(&row.status)?,
                    assigned_officer_id: row.assigned_officer_id,
                    updates: trails.remove(&row.id).unwrap_or_default(),
                    version: row.version,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
            })
            .collect()
    }

    async fn insert_evidence_rows(
        tx: &mut Transaction<'_, Postgres>,
        complaint_id: Uuid,
        update_id: Option<Uuid>,
        evidence: &[EvidenceRef],
    ) -> Result<(), AppError> {
        for item in evidence {
            sqlx::query(
                "INSERT INTO complaint_evidence \
                 (complaint_id, update_id, evidence_id, filename, size, mimetype) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(complaint_id)
            .bind(update_id)
            .bind(&item.id)
            .bind(&item.filename)
            .bind(item.size)
            .bind(&item.mimetype)
            .execute(&mut **tx)
            .await
            .or_db()?;
        }
        Ok(())
    }

    async fn fetch_users(&self, sql: &str, bind: Option<&str>) -> Result<Vec<User>, AppError> {
        let mut query = sqlx::query_as::<_, UserRow>(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        query
            .fetch_all(&self.pool)
            .await
            .or_db()?
            .into_iter()
            .map(User::try_from)
            .collect()
    }
}

#[async_trait]
impl Repository for PgRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .or_db()?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (id, role, full_name, email, phone, national_id, address, gender, \
             date_of_birth, password_hash, posting_site, badge_number, verified, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(user.id)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(user.email.trim().to_lowercase())
        .bind(&user.phone)
        .bind(&user.national_id)
        .bind(&user.address)
        .bind(&user.gender)
        .bind(user.date_of_birth)
        .bind(&user.password_hash)
        .bind(&user.posting_site)
        .bind(&user.badge_number)
        .bind(user.verified)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .or_db()?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .or_db()?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let mut users = self
            .fetch_users(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"),
                Some(email.trim()),
            )
            .await?;
        Ok(users.pop())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .or_db()?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn list_officers(&self) -> Result<Vec<User>, AppError> {
        self.fetch_users(
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = 'officer' ORDER BY created_at, id"
            ),
            None,
        )
        .await
    }

    async fn verified_officers_at(&self, site: &str) -> Result<Vec<User>, AppError> {
        self.fetch_users(
            &format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE role = 'officer' AND verified AND posting_site = $1 \
                 ORDER BY created_at, id"
            ),
            Some(site),
        )
        .await
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET role = $2, full_name = $3, phone = $4, address = $5, gender = $6, \
             date_of_birth = $7, posting_site = $8, badge_number = $9, verified = $10 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.gender)
        .bind(user.date_of_birth)
        .bind(&user.posting_site)
        .bind(&user.badge_number)
        .bind(user.verified)
        .execute(&self.pool)
        .await
        .or_db()?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User not found"));
        }
        Ok(())
    }

    async fn delete_user_cascade(&self, id: Uuid) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await.or_db()?;

        let removed = sqlx::query("DELETE FROM complaints WHERE reporter_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_db()?
            .rows_affected();

        sqlx::query(
            "UPDATE complaints SET assigned_officer_id = NULL, version = version + 1, \
             updated_at = NOW() WHERE assigned_officer_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_db()?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_db()?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await.or_db()?;
            return Err(AppError::not_found("User not found"));
        }

        tx.commit().await.or_db()?;
        Ok(removed)
    }

    async fn insert_complaint(&self, complaint: &Complaint) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.or_db()?;

        sqlx::query(
            "INSERT INTO complaints (id, reporter_id, anonymous, emergency, complaint_type, \
             incident_date, incident_time, location, nearest_landmark, description, \
             relation_to_victim, victims, accused, status, assigned_officer_id, version, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(complaint.id)
        .bind(complaint.reporter_id)
        .bind(complaint.anonymous)
        .bind(complaint.emergency)
        .bind(&complaint.complaint_type)
        .bind(complaint.incident_date)
        .bind(complaint.incident_time)
        .bind(&complaint.location)
        .bind(&complaint.nearest_landmark)
        .bind(&complaint.description)
        .bind(&complaint.relation_to_victim)
        .bind(Json(&complaint.victims))
        .bind(Json(&complaint.accused))
        .bind(complaint.status.as_str())
        .bind(complaint.assigned_officer_id)
        .bind(complaint.version)
        .bind(complaint.created_at)
        .bind(complaint.updated_at)
        .execute(&mut *tx)
        .await
        .or_db()?;

        Self::insert_evidence_rows(&mut tx, complaint.id, None, &complaint.evidence).await?;

        tx.commit().await.or_db()?;
        Ok(())
    }

    async fn find_complaint(&self, id: Uuid) -> Result<Option<Complaint>, AppError> {
        let rows = sqlx::query_as::<_, ComplaintRow>(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = $1"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .or_db()?;
        Ok(self.hydrate(rows).await?.pop())
    }

    async fn list_complaints(
        &self,
        scope: ComplaintScope,
        filter: &ComplaintFilter,
    ) -> Result<Vec<Complaint>, AppError> {
        let (reporter, officer, everything) = match scope {
            ComplaintScope::All => (None, None, true),
            ComplaintScope::ReportedBy(id) => (Some(id), None, false),
            ComplaintScope::AssignedTo(id) => (None, Some(id), false),
        };
        let direction = match filter.sort {
            SortOrder::Recent => "DESC",
            SortOrder::Oldest => "ASC",
        };

        let rows = sqlx::query_as::<_, ComplaintRow>(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints \
             WHERE ($1 OR (reporter_id = $2 AND NOT anonymous) OR assigned_officer_id = $3) \
               AND ($4::text IS NULL OR complaint_type = $4) \
               AND ($5::text IS NULL OR status = $5) \
             ORDER BY created_at {direction}, id {direction}"
        ))
        .bind(everything)
        .bind(reporter)
        .bind(officer)
        .bind(&filter.complaint_type)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .or_db()?;

        self.hydrate(rows).await
    }

    async fn find_complaint_by_evidence(
        &self,
        evidence_id: &str,
    ) -> Result<Option<Complaint>, AppError> {
        let owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT complaint_id FROM complaint_evidence WHERE evidence_id = $1 LIMIT 1",
        )
        .bind(evidence_id)
        .fetch_optional(&self.pool)
        .await
        .or_db()?;

        match owner {
            Some(id) => self.find_complaint(id).await,
            None => Ok(None),
        }
    }

    async fn update_complaint(
        &self,
        next: &Complaint,
        expected_version: i64,
        appended: &Appended,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await.or_db()?;

        let swapped = sqlx::query(
            "UPDATE complaints SET complaint_type = $3, incident_date = $4, incident_time = $5, \
             location = $6, nearest_landmark = $7, description = $8, relation_to_victim = $9, \
             victims = $10, accused = $11, status = $12, assigned_officer_id = $13, \
             version = $14, updated_at = $15 \
             WHERE id = $1 AND version = $2",
        )
        .bind(next.id)
        .bind(expected_version)
        .bind(&next.complaint_type)
        .bind(next.incident_date)
        .bind(next.incident_time)
        .bind(&next.location)
        .bind(&next.nearest_landmark)
        .bind(&next.description)
        .bind(&next.relation_to_victim)
        .bind(Json(&next.victims))
        .bind(Json(&next.accused))
        .bind(next.status.as_str())
        .bind(next.assigned_officer_id)
        .bind(next.version)
        .bind(next.updated_at)
        .execute(&mut *tx)
        .await
        .or_db()?
        .rows_affected();

        if swapped == 0 {
            tx.rollback().await.or_db()?;
            return Ok(false);
        }

        Self::insert_evidence_rows(&mut tx, next.id, None, &appended.evidence).await?;

        if let Some(entry) = &appended.update {
            sqlx::query(
                "INSERT INTO complaint_updates \
                 (id, complaint_id, seq, author_id, author_kind, note, status, created_at) \
                 VALUES ($1, $2, \
                   (SELECT COALESCE(MAX(seq), 0) + 1 FROM complaint_updates WHERE complaint_id = $2), \
                   $3, $4, $5, $6, $7)",
            )
            .bind(entry.id)
            .bind(next.id)
            .bind(entry.author_id)
            .bind(entry.author_kind.as_str())
            .bind(&entry.note)
            .bind(entry.status.as_str())
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await
            .or_db()?;

            Self::insert_evidence_rows(&mut tx, next.id, Some(entry.id), &entry.evidence).await?;
        }

        tx.commit().await.or_db()?;
        Ok(true)
    }

    async fn complaint_facts(&self) -> Result<Vec<ComplaintFact>, AppError> {
        sqlx::query_as::<_, FactRow>(
            "SELECT complaint_type, status, assigned_officer_id FROM complaints",
        )
        .fetch_all(&self.pool)
        .await
        .or_db()?
        .into_iter()
        .map(|row| {
            Ok(ComplaintFact {
                complaint_type: row.complaint_type,
                status: parse_status(&row.status)?,
                assigned_officer_id: row.assigned_officer_id,
            })
        })
        .collect()
    }

    async fn push_notification(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, message, category, complaint_id, read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.message)
        .bind(notification.category.as_str())
        .bind(notification.complaint_id)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .or_db()?;
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, AppError> {
        sqlx::query_as::<_, NotificationRow>(
            "SELECT id, user_id, message, category, complaint_id, read, created_at \
             FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .or_db()?
        .into_iter()
        .map(Notification::try_from)
        .collect()
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .or_db()?;
        Ok(result.rows_affected() > 0)
    }
}
