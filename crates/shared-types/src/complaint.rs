use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::AppError;

// ---------------------------------------------------------------------------
// Status state machine
// ---------------------------------------------------------------------------

/// Lifecycle status of a complaint.
///
/// `Submitted` is the only initial state. `Closed` and `Withdrawn` are
/// terminal: nothing moves a record out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ComplaintStatus {
    Submitted,
    #[serde(rename = "Under Review")]
    UnderReview,
    Investigation,
    Closed,
    Withdrawn,
}

/// All statuses in lifecycle order.
pub const COMPLAINT_STATUSES: &[ComplaintStatus] = &[
    ComplaintStatus::Submitted,
    ComplaintStatus::UnderReview,
    ComplaintStatus::Investigation,
    ComplaintStatus::Closed,
    ComplaintStatus::Withdrawn,
];

/// Why a requested status change was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The record is already `Closed` or `Withdrawn`.
    Terminal(ComplaintStatus),
    /// Nothing may return a record to `Submitted`.
    BackToSubmitted,
    /// `Withdrawn` is reached only through reporter withdrawal.
    ReporterOnly,
    /// Investigative statuses only move forward.
    Backwards {
        from: ComplaintStatus,
        to: ComplaintStatus,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::Terminal(s) => {
                write!(f, "Complaint is {} and can no longer change", s.as_str())
            }
            TransitionError::BackToSubmitted => {
                write!(f, "A complaint cannot be returned to Submitted")
            }
            TransitionError::ReporterOnly => {
                write!(f, "Only the reporter can withdraw a complaint")
            }
            TransitionError::Backwards { from, to } => write!(
                f,
                "Cannot move a complaint from {} back to {}",
                from.as_str(),
                to.as_str()
            ),
        }
    }
}

impl ComplaintStatus {
    /// Human-readable label, also the wire and storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Submitted => "Submitted",
            ComplaintStatus::UnderReview => "Under Review",
            ComplaintStatus::Investigation => "Investigation",
            ComplaintStatus::Closed => "Closed",
            ComplaintStatus::Withdrawn => "Withdrawn",
        }
    }

    /// Parse a status label. Accepts the canonical label case-insensitively
    /// as well as the snake_case form (`under_review`).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "submitted" => Some(ComplaintStatus::Submitted),
            "under review" => Some(ComplaintStatus::UnderReview),
            "investigation" => Some(ComplaintStatus::Investigation),
            "closed" => Some(ComplaintStatus::Closed),
            "withdrawn" => Some(ComplaintStatus::Withdrawn),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Closed | ComplaintStatus::Withdrawn)
    }

    /// Open cases count toward an officer's workload.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Substantive edits and withdrawal are only possible before review starts.
    pub fn allows_reporter_changes(&self) -> bool {
        *self == ComplaintStatus::Submitted
    }

    fn investigative_rank(&self) -> u8 {
        match self {
            ComplaintStatus::Submitted => 0,
            ComplaintStatus::UnderReview => 1,
            ComplaintStatus::Investigation => 2,
            ComplaintStatus::Closed => 3,
            ComplaintStatus::Withdrawn => 3,
        }
    }

    /// Check a status change requested by an officer or admin.
    ///
    /// Staying on the current status is allowed (a note without a status
    /// change still records the label). Forward moves may skip stages.
    pub fn check_investigative_transition(
        self,
        to: ComplaintStatus,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        match to {
            ComplaintStatus::Withdrawn => Err(TransitionError::ReporterOnly),
            ComplaintStatus::Submitted if self != ComplaintStatus::Submitted => {
                Err(TransitionError::BackToSubmitted)
            }
            _ if to.investigative_rank() < self.investigative_rank() => {
                Err(TransitionError::Backwards { from: self, to })
            }
            _ => Ok(()),
        }
    }

    /// Check a reporter withdrawal.
    pub fn check_withdrawal(self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        if !self.allows_reporter_changes() {
            return Err(TransitionError::Backwards {
                from: self,
                to: ComplaintStatus::Withdrawn,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Record components
// ---------------------------------------------------------------------------

/// Opaque pointer to a blob held by the evidence store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EvidenceRef {
    pub id: String,
    pub filename: String,
    pub size: i64,
    pub mimetype: String,
}

/// Accept a string, number or null where free text is expected.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A victim named in the complaint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Victim {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, alias = "injuryLoss")]
    pub injury_loss: String,
    #[serde(default, alias = "medicalAid", skip_serializing_if = "Option::is_none")]
    pub medical_aid: Option<bool>,
}

/// Custody status of an accused person.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AccusedStatus {
    #[default]
    #[serde(alias = "", alias = "Unset")]
    Unset,
    #[serde(alias = "Arrested")]
    Arrested,
    #[serde(alias = "Absconding")]
    Absconding,
}

impl AccusedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccusedStatus::Unset => "unset",
            AccusedStatus::Arrested => "arrested",
            AccusedStatus::Absconding => "absconding",
        }
    }
}

/// An accused person named in the complaint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Accused {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: AccusedStatus,
    #[serde(default)]
    pub remarks: String,
}

/// Who wrote an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AuthorKind {
    Officer,
    Admin,
}

impl AuthorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorKind::Officer => "officer",
            AuthorKind::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "officer" => Some(AuthorKind::Officer),
            "admin" => Some(AuthorKind::Admin),
            _ => None,
        }
    }
}

/// One immutable entry of the investigative audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditEntry {
    pub id: Uuid,
    pub author_id: Uuid,
    #[serde(rename = "type")]
    pub author_kind: AuthorKind,
    pub note: String,
    /// Status of the complaint once this entry was written.
    pub status: ComplaintStatus,
    #[serde(default)]
    pub evidence: Vec<EvidenceRef>,
    pub created_at: DateTime<Utc>,
}

/// The central complaint record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Complaint {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_id: Option<Uuid>,
    pub anonymous: bool,
    pub emergency: bool,
    #[serde(rename = "type")]
    pub complaint_type: String,
    pub incident_date: NaiveDate,
    pub incident_time: NaiveTime,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_landmark: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_to_victim: Option<String>,
    pub victims: Vec<Victim>,
    pub accused: Vec<Accused>,
    pub evidence: Vec<EvidenceRef>,
    pub status: ComplaintStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_officer_id: Option<Uuid>,
    pub updates: Vec<AuditEntry>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    /// Every evidence id referenced anywhere in the record.
    pub fn evidence_ids(&self) -> impl Iterator<Item = &str> {
        self.evidence
            .iter()
            .chain(self.updates.iter().flat_map(|u| u.evidence.iter()))
            .map(|e| e.id.as_str())
    }

    /// Administrative notes, as shown on the rendered report.
    pub fn admin_notes(&self) -> Vec<&AuditEntry> {
        self.updates
            .iter()
            .filter(|u| u.author_kind == AuthorKind::Admin)
            .collect()
    }

    /// Short case number derived from the id, e.g. `FIR-3F2A9C1D`.
    pub fn case_number(&self) -> String {
        let simple = self.id.simple().to_string();
        format!("FIR-{}", simple[simple.len() - 8..].to_uppercase())
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Minimal identity shown alongside a complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PartySummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posting_site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_number: Option<String>,
}

/// A complaint as returned to a caller, with the parties that caller may see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComplaintView {
    #[serde(flatten)]
    pub complaint: Complaint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<PartySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_officer: Option<PartySummary>,
}

// ---------------------------------------------------------------------------
// Intake and mutation inputs
// ---------------------------------------------------------------------------

/// Raw fields of a full complaint filing, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComplaintForm {
    #[serde(default, rename = "type")]
    pub complaint_type: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub nearest_landmark: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub relation_to_victim: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub victims: Vec<Victim>,
    #[serde(default)]
    pub accused: Vec<Accused>,
}

/// Raw fields of an emergency filing. Everything else is defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EmergencyForm {
    #[serde(default, rename = "type")]
    pub complaint_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Reporter edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComplaintEdit {
    #[serde(default, rename = "type")]
    pub complaint_type: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub nearest_landmark: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub relation_to_victim: Option<String>,
    #[serde(default)]
    pub victims: Option<Vec<Victim>>,
    #[serde(default)]
    pub accused: Option<Vec<Accused>>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl ComplaintEdit {
    /// True when the edit touches no substantive field.
    pub fn is_empty(&self) -> bool {
        self.complaint_type.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.location.is_none()
            && self.nearest_landmark.is_none()
            && self.description.is_none()
            && self.relation_to_victim.is_none()
            && self.victims.is_none()
            && self.accused.is_none()
    }
}

/// Officer/admin update: a note, an optional status move, optional evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateForm {
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Body of `POST /api/admin/complaints/{id}/notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AdminNoteRequest {
    pub note: String,
}

/// Body of `POST /api/complaints/{id}/withdraw`. Optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WithdrawRequest {
    #[serde(default)]
    pub expected_version: Option<i64>,
}

// ---------------------------------------------------------------------------
// Field parsing helpers
// ---------------------------------------------------------------------------

/// Parse an incident date. Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_incident_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| AppError::invalid_field(field, format!("{field} must be a YYYY-MM-DD date")))
}

/// Parse an incident time. Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_incident_time(field: &str, raw: &str) -> Result<NaiveTime, AppError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| AppError::invalid_field(field, format!("{field} must be HH:MM or HH:MM:SS")))
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Query string of `GET /api/complaints`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ComplaintListQuery {
    #[serde(default, rename = "type")]
    pub complaint_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

/// Creation-time ordering of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Recent,
    Oldest,
}

/// Validated listing filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplaintFilter {
    pub complaint_type: Option<String>,
    pub status: Option<ComplaintStatus>,
    pub sort: SortOrder,
}

fn unless_all(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl ComplaintFilter {
    pub fn from_query(query: &ComplaintListQuery) -> Result<Self, AppError> {
        let status = match unless_all(query.status.as_deref()) {
            Some(raw) => Some(ComplaintStatus::parse(raw).ok_or_else(|| {
                AppError::invalid_field("status", format!("Unknown status: {raw}"))
            })?),
            None => None,
        };

        let sort = match unless_all(query.sort.as_deref()) {
            None | Some("recent") => SortOrder::Recent,
            Some("oldest") => SortOrder::Oldest,
            Some(other) => {
                return Err(AppError::invalid_field(
                    "sort",
                    format!("Unknown sort order: {other} (expected recent or oldest)"),
                ))
            }
        };

        Ok(Self {
            complaint_type: unless_all(query.complaint_type.as_deref()).map(str::to_string),
            status,
            sort,
        })
    }

    pub fn matches(&self, complaint: &Complaint) -> bool {
        self.complaint_type
            .as_deref()
            .map_or(true, |t| complaint.complaint_type == t)
            && self.status.map_or(true, |s| complaint.status == s)
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// A labelled count with its share of the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CountEntry {
    pub label: String,
    pub count: i64,
    pub percentage: f64,
}

/// Cases assigned to one officer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OfficerWorkload {
    pub officer_id: Uuid,
    pub full_name: String,
    pub badge_number: Option<String>,
    pub assigned_cases: i64,
    pub open_cases: i64,
}

/// Portal-wide statistics for administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComplaintStatistics {
    pub total_complaints: i64,
    pub active_cases: i64,
    pub closed_cases: i64,
    pub withdrawn_cases: i64,
    pub unassigned_cases: i64,
    /// Closed cases as a whole percentage of all complaints.
    pub resolution_rate: i64,
    pub by_type: Vec<CountEntry>,
    pub by_status: Vec<CountEntry>,
    pub officer_workload: Vec<OfficerWorkload>,
    pub total_officers: i64,
    pub verified_officers: i64,
}
