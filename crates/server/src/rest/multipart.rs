//! Multipart form intake for the complaint endpoints.
//!
//! Text parts are collected by name; parts named `evidence` are streamed
//! straight into the evidence store as they arrive, so no upload is ever
//! buffered whole in memory.

use axum::extract::Multipart;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use shared_types::{
    Accused, AppError, ComplaintEdit, ComplaintForm, EmergencyForm, EvidenceRef, UpdateForm,
    Victim,
};
use std::collections::HashMap;
use std::io;

use crate::storage::{BlobStream, EvidenceStore};

/// Form part that carries evidence files.
pub const EVIDENCE_FIELD: &str = "evidence";

/// File limits per endpoint.
pub const MAX_FILING_FILES: usize = 5;
pub const MAX_UPDATE_FILES: usize = 3;

fn malformed(e: impl std::fmt::Display) -> AppError {
    AppError::validation(format!("Malformed multipart body: {e}"), HashMap::new())
}

/// A parsed multipart body: text parts plus the evidence already stored.
#[derive(Debug, Default)]
pub struct ParsedForm {
    fields: HashMap<String, String>,
    pub evidence: Vec<EvidenceRef>,
}

impl ParsedForm {
    #[cfg(test)]
    fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            evidence: Vec::new(),
        }
    }

    /// First present value among `names` (camelCase and snake_case spellings).
    fn take(&mut self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.fields.remove(*name))
    }

    fn take_flag(&mut self, names: &[&str]) -> bool {
        self.take(names).map(|v| parse_flag(&v)).unwrap_or(false)
    }

    fn take_version(&mut self) -> Result<Option<i64>, AppError> {
        match self.take(&["expected_version", "expectedVersion"]) {
            Some(raw) => parse_version(&raw).map(Some),
            None => Ok(None),
        }
    }

    fn take_parties<T: DeserializeOwned>(
        &mut self,
        names: &[&str],
        label: &str,
    ) -> Result<Option<Vec<T>>, AppError> {
        match self.take(names) {
            Some(raw) => parse_parties(names[0], label, &raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn into_complaint_form(mut self) -> Result<(ComplaintForm, Vec<EvidenceRef>), AppError> {
        let form = ComplaintForm {
            complaint_type: self.take(&["type"]),
            date: self.take(&["date"]),
            time: self.take(&["time"]),
            location: self.take(&["location"]),
            nearest_landmark: self.take(&["nearestLandmark", "nearest_landmark"]),
            description: self.take(&["description"]),
            relation_to_victim: self.take(&["relationToVictim", "relation_to_victim"]),
            anonymous: self.take_flag(&["anonymous"]),
            victims: self
                .take_parties::<Victim>(&["victimDetails", "victims"], "Victim details")?
                .unwrap_or_default(),
            accused: self
                .take_parties::<Accused>(&["accusedDetails", "accused"], "Accused details")?
                .unwrap_or_default(),
        };
        Ok((form, self.evidence))
    }

    pub fn into_emergency_form(mut self) -> (EmergencyForm, Vec<EvidenceRef>) {
        let form = EmergencyForm {
            complaint_type: self.take(&["type"]),
            location: self.take(&["location"]),
            description: self.take(&["description"]),
        };
        (form, self.evidence)
    }

    pub fn into_edit(mut self) -> Result<(ComplaintEdit, Vec<EvidenceRef>), AppError> {
        let edit = ComplaintEdit {
            complaint_type: self.take(&["type"]),
            date: self.take(&["date"]),
            time: self.take(&["time"]),
            location: self.take(&["location"]),
            nearest_landmark: self.take(&["nearestLandmark", "nearest_landmark"]),
            description: self.take(&["description"]),
            relation_to_victim: self.take(&["relationToVictim", "relation_to_victim"]),
            victims: self.take_parties(&["victimDetails", "victims"], "Victim details")?,
            accused: self.take_parties(&["accusedDetails", "accused"], "Accused details")?,
            expected_version: self.take_version()?,
        };
        Ok((edit, self.evidence))
    }

    pub fn into_update_form(mut self) -> Result<(UpdateForm, Vec<EvidenceRef>), AppError> {
        let form = UpdateForm {
            note: self.take(&["note"]),
            status: self.take(&["status"]),
            expected_version: self.take_version()?,
        };
        Ok((form, self.evidence))
    }
}

/// HTML checkbox semantics: `true`, `1`, `on` and `yes` are set.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

pub fn parse_version(raw: &str) -> Result<i64, AppError> {
    raw.trim().parse::<i64>().map_err(|_| {
        AppError::invalid_field("expected_version", "expected_version must be an integer")
    })
}

/// A JSON array of victims or accused. A blank part means none.
pub fn parse_parties<T: DeserializeOwned>(
    field: &str,
    label: &str,
    raw: &str,
) -> Result<Vec<T>, AppError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| AppError::invalid_field(field, format!("{label} must be a JSON array: {e}")))
}

/// Drain a multipart body, storing every `evidence` part as it streams in.
///
/// A store failure aborts the whole body. Parts stored before the failure
/// stay in the store unreferenced.
#[tracing::instrument(skip(multipart, store))]
pub async fn read_form(
    mut multipart: Multipart,
    store: &dyn EvidenceStore,
    max_files: usize,
) -> Result<ParsedForm, AppError> {
    let mut parsed = ParsedForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == EVIDENCE_FIELD {
            let filename = field.file_name().unwrap_or_default().to_string();
            // Browsers submit an empty part for an untouched file input.
            if filename.is_empty() {
                continue;
            }
            if parsed.evidence.len() >= max_files {
                return Err(AppError::invalid_field(
                    EVIDENCE_FIELD,
                    format!("At most {max_files} files may be attached"),
                ));
            }
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let body: BlobStream<'_> =
                Box::pin(field.map(|chunk| chunk.map_err(|e| io::Error::other(e.to_string()))));
            let evidence = store.store(body, &filename, &content_type).await?;
            tracing::debug!(evidence_id = %evidence.id, size = evidence.size, "Evidence part stored");
            parsed.evidence.push(evidence);
        } else if !name.is_empty() {
            let value = field.text().await.map_err(malformed)?;
            parsed.fields.insert(name, value);
        }
    }

    Ok(parsed)
}
