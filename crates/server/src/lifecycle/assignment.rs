//! Officer routing by posting site.

use shared_types::{AppError, User};
use uuid::Uuid;

use crate::repo::Repository;

/// Pick the officer for `location` among `officers`.
///
/// Only verified officers whose posting site equals the location exactly are
/// eligible, and never the complaint's own reporter. Among those the earliest
/// provisioned wins, then the lowest id, so the same directory always yields
/// the same officer.
pub fn select_officer<'a>(
    officers: &'a [User],
    location: &str,
    reporter: Option<Uuid>,
) -> Option<&'a User> {
    officers
        .iter()
        .filter(|o| o.is_officer() && o.verified && o.posting_site.as_deref() == Some(location))
        .filter(|o| reporter != Some(o.id))
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

/// Resolve the officer for `location` against the directory.
#[tracing::instrument(skip(repo))]
pub async fn resolve_officer(
    repo: &dyn Repository,
    location: &str,
    reporter: Option<Uuid>,
) -> Result<Option<User>, AppError> {
    let candidates = repo.verified_officers_at(location).await?;
    let chosen = select_officer(&candidates, location, reporter).cloned();
    match &chosen {
        Some(officer) => tracing::debug!(officer_id = %officer.id, "Resolved officer"),
        None => tracing::debug!("No officer posted at location"),
    }
    Ok(chosen)
}
