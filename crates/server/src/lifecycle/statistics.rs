use shared_types::{
    ComplaintStatistics, ComplaintStatus, CountEntry, OfficerWorkload, User, COMPLAINT_STATUSES,
};
use std::collections::{BTreeMap, HashMap};

use crate::repo::ComplaintFact;

fn share(count: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((count as f64 / total as f64) * 1000.0).round() / 10.0
}

/// Aggregate complaint facts and the officer roster into portal statistics.
///
/// Types are listed by descending count then name; statuses in lifecycle
/// order, omitting those with no complaints; officers by descending workload
/// then name. Officers with no cases are included.
pub fn compute(facts: &[ComplaintFact], officers: &[User]) -> ComplaintStatistics {
    let total = facts.len() as i64;
    let count_status = |s: ComplaintStatus| facts.iter().filter(|f| f.status == s).count() as i64;

    let closed = count_status(ComplaintStatus::Closed);
    let withdrawn = count_status(ComplaintStatus::Withdrawn);
    let active = facts.iter().filter(|f| f.status.is_open()).count() as i64;
    let unassigned = facts.iter().filter(|f| f.assigned_officer_id.is_none()).count() as i64;
    let resolution_rate = if total > 0 {
        ((closed as f64 / total as f64) * 100.0).round() as i64
    } else {
        0
    };

    let mut types: BTreeMap<&str, i64> = BTreeMap::new();
    for fact in facts {
        *types.entry(fact.complaint_type.as_str()).or_default() += 1;
    }
    let mut by_type: Vec<CountEntry> = types
        .into_iter()
        .map(|(label, count)| CountEntry {
            label: label.to_string(),
            count,
            percentage: share(count, total),
        })
        .collect();
    by_type.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    let by_status = COMPLAINT_STATUSES
        .iter()
        .map(|&status| (status, count_status(status)))
        .filter(|(_, count)| *count > 0)
        .map(|(status, count)| CountEntry {
            label: status.as_str().to_string(),
            count,
            percentage: share(count, total),
        })
        .collect();

    let mut load: HashMap<uuid::Uuid, (i64, i64)> = HashMap::new();
    for fact in facts {
        if let Some(officer_id) = fact.assigned_officer_id {
            let entry = load.entry(officer_id).or_default();
            entry.0 += 1;
            if fact.status.is_open() {
                entry.1 += 1;
            }
        }
    }
    let mut officer_workload: Vec<OfficerWorkload> = officers
        .iter()
        .map(|o| {
            let (assigned_cases, open_cases) = load.get(&o.id).copied().unwrap_or_default();
            OfficerWorkload {
                officer_id: o.id,
                full_name: o.full_name.clone(),
                badge_number: o.badge_number.clone(),
                assigned_cases,
                open_cases,
            }
        })
        .collect();
    officer_workload.sort_by(|a, b| {
        b.assigned_cases
            .cmp(&a.assigned_cases)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });

    ComplaintStatistics {
        total_complaints: total,
        active_cases: active,
        closed_cases: closed,
        withdrawn_cases: withdrawn,
        unassigned_cases: unassigned,
        resolution_rate,
        by_type,
        by_status,
        officer_workload,
        total_officers: officers.len() as i64,
        verified_officers: officers.iter().filter(|o| o.verified).count() as i64,
    }
}
