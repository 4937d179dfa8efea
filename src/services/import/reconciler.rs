//! Duplicate reconciliation.
//!
//! Candidates collapse by phone before anything touches the store, so
//! one file row set maps to at most one write per phone. The merged
//! set then splits into inserts and star-increment updates against the
//! company's existing numbers.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use uuid::Uuid;

use crate::types::import::LeadCandidate;

use super::writer::LeadStore;

/// Phones per existing-lookup query.
pub const PHONE_LOOKUP_CHUNK: usize = 1_000;

/// Merged candidates split by whether the phone already exists.
#[derive(Debug, Default)]
pub struct ReconciledBatch {
    pub to_insert: Vec<LeadCandidate>,
    pub to_update: Vec<LeadCandidate>,
}

/// Collapse repeated phones into one candidate each. `star` accumulates
/// the occurrence count; later non-empty values win per field; the row
/// number of the first occurrence is kept for error reporting.
pub fn merge_duplicates(candidates: Vec<LeadCandidate>) -> Vec<LeadCandidate> {
    let mut merged: Vec<LeadCandidate> = Vec::with_capacity(candidates.len());
    let mut by_phone: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        match by_phone.get(&candidate.phone) {
            Some(&i) => merge_into(&mut merged[i], candidate),
            None => {
                by_phone.insert(candidate.phone.clone(), merged.len());
                merged.push(candidate);
            }
        }
    }
    merged
}

fn merge_into(existing: &mut LeadCandidate, later: LeadCandidate) {
    existing.star += later.star;
    existing.first_name = later.first_name;
    existing.last_name = later.last_name;
    if later.email.is_some() {
        existing.email = later.email;
    }
    if later.alt_phone.is_some() {
        existing.alt_phone = later.alt_phone;
    }
    if later.lead_source.is_some() {
        existing.lead_source = later.lead_source;
    }
    if later.tag.is_some() {
        existing.tag = later.tag;
    }
    if later.platform.is_some() {
        existing.platform = later.platform;
    }
    if later.activity.is_some() {
        existing.activity = later.activity;
    }
}

/// Split merged candidates by membership in the company's live phone
/// set. Lookups go out in bounded chunks; phones are distinct after the
/// merge, so the two sides never overlap.
pub async fn partition(
    store: &dyn LeadStore,
    company_id: Uuid,
    merged: Vec<LeadCandidate>,
) -> Result<ReconciledBatch> {
    let phones: Vec<String> = merged.iter().map(|c| c.phone.clone()).collect();
    let mut existing: HashSet<String> = HashSet::with_capacity(phones.len());
    for chunk in phones.chunks(PHONE_LOOKUP_CHUNK) {
        existing.extend(store.existing_phones(company_id, chunk).await?);
    }

    let (to_update, to_insert) = merged
        .into_iter()
        .partition(|c| existing.contains(&c.phone));
    Ok(ReconciledBatch { to_insert, to_update })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::import::writer::MockLeadStore;

    fn candidate(phone: &str, row: u32, first: &str) -> LeadCandidate {
        LeadCandidate {
            source_row: row,
            first_name: first.to_string(),
            last_name: "Doe".to_string(),
            phone: phone.to_string(),
            email: None,
            alt_phone: None,
            lead_source: None,
            tag: None,
            platform: None,
            activity: None,
            star: 1,
        }
    }

    #[test]
    fn distinct_phones_pass_through_in_order() {
        let merged = merge_duplicates(vec![
            candidate("5550100100", 1, "Jane"),
            candidate("5550100101", 2, "John"),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].phone, "5550100100");
        assert_eq!(merged[1].phone, "5550100101");
        assert!(merged.iter().all(|c| c.star == 1));
    }

    #[test]
    fn repeated_phone_collapses_with_occurrence_count() {
        let mut second = candidate("5550100100", 4, "Janet");
        second.email = Some("janet@x.com".to_string());
        let merged = merge_duplicates(vec![
            candidate("5550100100", 1, "Jane"),
            candidate("5550100101", 2, "John"),
            second,
        ]);

        assert_eq!(merged.len(), 2);
        let jane = &merged[0];
        assert_eq!(jane.star, 2);
        assert_eq!(jane.first_name, "Janet");
        assert_eq!(jane.email.as_deref(), Some("janet@x.com"));
        // first occurrence keeps its row for error reporting
        assert_eq!(jane.source_row, 1);
    }

    #[test]
    fn later_empty_values_do_not_erase_earlier_ones() {
        let mut first = candidate("5550100100", 1, "Jane");
        first.email = Some("jane@x.com".to_string());
        let merged = merge_duplicates(vec![first, candidate("5550100100", 2, "Jane")]);

        assert_eq!(merged[0].email.as_deref(), Some("jane@x.com"));
        assert_eq!(merged[0].star, 2);
    }

    #[tokio::test]
    async fn partitions_by_existing_phone() {
        let store = MockLeadStore::default();
        store.seed(candidate("5550100100", 0, "Jane"));
        let company = uuid::Uuid::new_v4();

        let batch = partition(
            &store,
            company,
            vec![
                candidate("5550100100", 1, "Jane"),
                candidate("5550100101", 2, "John"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(batch.to_update.len(), 1);
        assert_eq!(batch.to_update[0].phone, "5550100100");
        assert_eq!(batch.to_insert.len(), 1);
        assert_eq!(batch.to_insert[0].phone, "5550100101");
    }
}
