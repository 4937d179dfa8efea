//! Lead persistence for the import pipeline.
//!
//! `LeadStore` hides the two-tier write strategy behind one interface:
//! bulk chunks first, row-by-row when a chunk fails, and a duplicate
//! key on insert retried as a star increment. The mock implementation
//! backs the pipeline tests.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db::queries;
use crate::types::import::{ImportError, LeadCandidate};

use super::reconciler::ReconciledBatch;

/// Records per bulk statement, comfortably below the bind ceiling.
pub const WRITE_CHUNK_SIZE: usize = 10_000;

// =============================================================================
// STORE INTERFACE
// =============================================================================

/// Store operations the import pipeline needs.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Subset of `phones` already held by a live lead of this company.
    async fn existing_phones(&self, company_id: Uuid, phones: &[String]) -> Result<Vec<String>>;

    /// Multi-row insert of one chunk. All-or-nothing per chunk.
    async fn insert_chunk(
        &self,
        company_id: Uuid,
        campaign_id: Option<Uuid>,
        chunk: &[LeadCandidate],
    ) -> Result<u64>;

    /// Bulk star-increment update of one chunk. Returns leads touched.
    async fn update_chunk(
        &self,
        company_id: Uuid,
        campaign_id: Option<Uuid>,
        chunk: &[LeadCandidate],
    ) -> Result<u64>;

    async fn insert_one(
        &self,
        company_id: Uuid,
        campaign_id: Option<Uuid>,
        candidate: &LeadCandidate,
    ) -> Result<()>;

    /// Returns whether a live lead with the candidate's phone existed.
    async fn update_one(
        &self,
        company_id: Uuid,
        campaign_id: Option<Uuid>,
        candidate: &LeadCandidate,
    ) -> Result<bool>;

    /// Best-effort campaign lead counter bump.
    async fn add_campaign_leads(&self, campaign_id: Uuid, count: i64) -> Result<()>;
}

/// Postgres-backed store used by the worker.
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn existing_phones(&self, company_id: Uuid, phones: &[String]) -> Result<Vec<String>> {
        queries::import::fetch_existing_phones(&self.pool, company_id, phones).await
    }

    async fn insert_chunk(
        &self,
        company_id: Uuid,
        campaign_id: Option<Uuid>,
        chunk: &[LeadCandidate],
    ) -> Result<u64> {
        queries::import::bulk_insert_leads(&self.pool, company_id, campaign_id, chunk).await
    }

    async fn update_chunk(
        &self,
        company_id: Uuid,
        campaign_id: Option<Uuid>,
        chunk: &[LeadCandidate],
    ) -> Result<u64> {
        queries::import::bulk_increment_stars(&self.pool, company_id, campaign_id, chunk).await
    }

    async fn insert_one(
        &self,
        company_id: Uuid,
        campaign_id: Option<Uuid>,
        candidate: &LeadCandidate,
    ) -> Result<()> {
        queries::import::insert_import_lead(&self.pool, company_id, campaign_id, candidate).await
    }

    async fn update_one(
        &self,
        company_id: Uuid,
        campaign_id: Option<Uuid>,
        candidate: &LeadCandidate,
    ) -> Result<bool> {
        queries::import::increment_lead_star(&self.pool, company_id, campaign_id, candidate).await
    }

    async fn add_campaign_leads(&self, campaign_id: Uuid, count: i64) -> Result<()> {
        queries::campaign::increment_campaign_total(&self.pool, campaign_id, count).await
    }
}

// =============================================================================
// BATCH WRITER
// =============================================================================

/// Net result of persisting one reconciled batch.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub inserted: u32,
    pub updated: u32,
    pub errors: Vec<ImportError>,
}

/// Persist a reconciled batch. A failed chunk degrades to row-by-row
/// writes; a duplicate key on insert means a concurrent import won the
/// race, so the record is retried as an update.
pub async fn write_batch(
    store: &dyn LeadStore,
    company_id: Uuid,
    campaign_id: Option<Uuid>,
    batch: ReconciledBatch,
) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();

    for chunk in batch.to_insert.chunks(WRITE_CHUNK_SIZE) {
        match store.insert_chunk(company_id, campaign_id, chunk).await {
            Ok(count) => outcome.inserted += count as u32,
            Err(e) => {
                warn!(
                    "Bulk insert of {} leads failed, retrying row-by-row: {}",
                    chunk.len(),
                    e
                );
                insert_fallback(store, company_id, campaign_id, chunk, &mut outcome).await;
            }
        }
    }

    for chunk in batch.to_update.chunks(WRITE_CHUNK_SIZE) {
        match store.update_chunk(company_id, campaign_id, chunk).await {
            Ok(count) => outcome.updated += count as u32,
            Err(e) => {
                warn!(
                    "Bulk update of {} leads failed, retrying row-by-row: {}",
                    chunk.len(),
                    e
                );
                update_fallback(store, company_id, campaign_id, chunk, &mut outcome).await;
            }
        }
    }

    if let Some(cid) = campaign_id {
        if outcome.inserted > 0 {
            if let Err(e) = store.add_campaign_leads(cid, i64::from(outcome.inserted)).await {
                warn!("Failed to bump lead counter for campaign {}: {}", cid, e);
            }
        }
    }

    outcome
}

async fn insert_fallback(
    store: &dyn LeadStore,
    company_id: Uuid,
    campaign_id: Option<Uuid>,
    chunk: &[LeadCandidate],
    outcome: &mut WriteOutcome,
) {
    for candidate in chunk {
        match store.insert_one(company_id, campaign_id, candidate).await {
            Ok(()) => outcome.inserted += 1,
            Err(e) if is_unique_violation(&e) => {
                match store.update_one(company_id, campaign_id, candidate).await {
                    Ok(true) => outcome.updated += 1,
                    Ok(false) => outcome.errors.push(ImportError {
                        row: candidate.source_row,
                        reason: "Lead already exists but could not be updated".to_string(),
                    }),
                    Err(e) => outcome.errors.push(write_error(candidate, &e)),
                }
            }
            Err(e) => outcome.errors.push(write_error(candidate, &e)),
        }
    }
}

async fn update_fallback(
    store: &dyn LeadStore,
    company_id: Uuid,
    campaign_id: Option<Uuid>,
    chunk: &[LeadCandidate],
    outcome: &mut WriteOutcome,
) {
    for candidate in chunk {
        match store.update_one(company_id, campaign_id, candidate).await {
            Ok(true) => outcome.updated += 1,
            Ok(false) => outcome.errors.push(ImportError {
                row: candidate.source_row,
                reason: "Matching lead disappeared before it could be updated".to_string(),
            }),
            Err(e) => outcome.errors.push(write_error(candidate, &e)),
        }
    }
}

fn write_error(candidate: &LeadCandidate, err: &anyhow::Error) -> ImportError {
    ImportError {
        row: candidate.source_row,
        reason: format!("Could not save lead: {}", err),
    }
}

/// Concurrent imports can both decide "insert" for the same phone; the
/// partial unique index turns the loser into this error.
fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

// =============================================================================
// MOCK STORE (tests)
// =============================================================================

/// In-memory store for exercising the pipeline without Postgres.
/// Stored records reuse [`LeadCandidate`]; `star` holds the running
/// total after increments.
#[cfg(test)]
#[derive(Default)]
pub struct MockLeadStore {
    pub leads: parking_lot::Mutex<std::collections::HashMap<String, LeadCandidate>>,
    pub fail_bulk_inserts: bool,
    pub fail_bulk_updates: bool,
    /// Phones whose row-by-row insert fails with a generic error.
    pub poison_phones: Vec<String>,
    pub campaign_bumps: parking_lot::Mutex<Vec<(Uuid, i64)>>,
}

#[cfg(test)]
impl MockLeadStore {
    pub fn seed(&self, candidate: LeadCandidate) {
        self.leads.lock().insert(candidate.phone.clone(), candidate);
    }

    fn apply_update(stored: &mut LeadCandidate, incoming: &LeadCandidate) {
        stored.star += incoming.star;
        stored.first_name = incoming.first_name.clone();
        stored.last_name = incoming.last_name.clone();
        if incoming.email.is_some() {
            stored.email = incoming.email.clone();
        }
        if incoming.alt_phone.is_some() {
            stored.alt_phone = incoming.alt_phone.clone();
        }
        if incoming.lead_source.is_some() {
            stored.lead_source = incoming.lead_source.clone();
        }
        if incoming.tag.is_some() {
            stored.tag = incoming.tag.clone();
        }
        if incoming.platform.is_some() {
            stored.platform = incoming.platform.clone();
        }
        if incoming.activity.is_some() {
            stored.activity = incoming.activity.clone();
        }
    }
}

#[cfg(test)]
#[async_trait]
impl LeadStore for MockLeadStore {
    async fn existing_phones(&self, _company_id: Uuid, phones: &[String]) -> Result<Vec<String>> {
        let leads = self.leads.lock();
        Ok(phones
            .iter()
            .filter(|p| leads.contains_key(p.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_chunk(
        &self,
        _company_id: Uuid,
        _campaign_id: Option<Uuid>,
        chunk: &[LeadCandidate],
    ) -> Result<u64> {
        if self.fail_bulk_inserts {
            anyhow::bail!("bulk insert rejected");
        }
        let mut leads = self.leads.lock();
        if chunk
            .iter()
            .any(|c| leads.contains_key(&c.phone) || self.poison_phones.contains(&c.phone))
        {
            anyhow::bail!("duplicate key value violates unique constraint");
        }
        for candidate in chunk {
            leads.insert(candidate.phone.clone(), candidate.clone());
        }
        Ok(chunk.len() as u64)
    }

    async fn update_chunk(
        &self,
        _company_id: Uuid,
        _campaign_id: Option<Uuid>,
        chunk: &[LeadCandidate],
    ) -> Result<u64> {
        if self.fail_bulk_updates {
            anyhow::bail!("bulk update rejected");
        }
        let mut leads = self.leads.lock();
        let mut touched = 0;
        for candidate in chunk {
            if let Some(stored) = leads.get_mut(&candidate.phone) {
                Self::apply_update(stored, candidate);
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn insert_one(
        &self,
        _company_id: Uuid,
        _campaign_id: Option<Uuid>,
        candidate: &LeadCandidate,
    ) -> Result<()> {
        if self.poison_phones.contains(&candidate.phone) {
            anyhow::bail!("simulated write failure");
        }
        let mut leads = self.leads.lock();
        if leads.contains_key(&candidate.phone) {
            return Err(sqlx::Error::Database(Box::new(FakeUniqueViolation)).into());
        }
        leads.insert(candidate.phone.clone(), candidate.clone());
        Ok(())
    }

    async fn update_one(
        &self,
        _company_id: Uuid,
        _campaign_id: Option<Uuid>,
        candidate: &LeadCandidate,
    ) -> Result<bool> {
        let mut leads = self.leads.lock();
        match leads.get_mut(&candidate.phone) {
            Some(stored) => {
                Self::apply_update(stored, candidate);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_campaign_leads(&self, campaign_id: Uuid, count: i64) -> Result<()> {
        self.campaign_bumps.lock().push((campaign_id, count));
        Ok(())
    }
}

/// Stand-in for the Postgres unique-violation error so the retry path
/// is reachable from tests.
#[cfg(test)]
#[derive(Debug)]
struct FakeUniqueViolation;

#[cfg(test)]
impl std::fmt::Display for FakeUniqueViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "duplicate key value violates unique constraint \"idx_leads_company_phone\""
        )
    }
}

#[cfg(test)]
impl std::error::Error for FakeUniqueViolation {}

#[cfg(test)]
impl sqlx::error::DatabaseError for FakeUniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(phone: &str, row: u32) -> LeadCandidate {
        LeadCandidate {
            source_row: row,
            first_name: "Jane".to_string(),
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

    fn batch(to_insert: Vec<LeadCandidate>, to_update: Vec<LeadCandidate>) -> ReconciledBatch {
        ReconciledBatch { to_insert, to_update }
    }

    #[tokio::test]
    async fn bulk_insert_happy_path() {
        let store = MockLeadStore::default();
        let company = Uuid::new_v4();

        let outcome = write_batch(
            &store,
            company,
            None,
            batch(vec![candidate("5550100100", 1), candidate("5550100101", 2)], vec![]),
        )
        .await;

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.updated, 0);
        assert!(outcome.errors.is_empty());
        assert_eq!(store.leads.lock().len(), 2);
    }

    #[tokio::test]
    async fn chunk_failure_falls_back_row_by_row() {
        let store = MockLeadStore {
            fail_bulk_inserts: true,
            poison_phones: vec!["5550100102".to_string()],
            ..Default::default()
        };
        let company = Uuid::new_v4();

        let outcome = write_batch(
            &store,
            company,
            None,
            batch(
                vec![
                    candidate("5550100100", 1),
                    candidate("5550100101", 2),
                    candidate("5550100102", 3),
                ],
                vec![],
            ),
        )
        .await;

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row, 3);
        assert!(store.leads.lock().contains_key("5550100101"));
        assert!(!store.leads.lock().contains_key("5550100102"));
    }

    #[tokio::test]
    async fn duplicate_key_insert_retried_as_update() {
        let store = MockLeadStore {
            fail_bulk_inserts: true,
            ..Default::default()
        };
        store.seed(candidate("5550100100", 0));
        let company = Uuid::new_v4();

        let mut incoming = candidate("5550100100", 1);
        incoming.star = 2;
        let outcome = write_batch(&store, company, None, batch(vec![incoming], vec![])).await;

        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.updated, 1);
        assert!(outcome.errors.is_empty());
        assert_eq!(store.leads.lock()["5550100100"].star, 3);
    }

    #[tokio::test]
    async fn bulk_update_refreshes_fields() {
        let store = MockLeadStore::default();
        let mut existing = candidate("5550100100", 0);
        existing.email = Some("old@x.com".to_string());
        existing.tag = Some("cold".to_string());
        store.seed(existing);
        let company = Uuid::new_v4();

        let mut incoming = candidate("5550100100", 1);
        incoming.star = 2;
        incoming.email = Some("new@x.com".to_string());
        let outcome = write_batch(&store, company, None, batch(vec![], vec![incoming])).await;

        assert_eq!(outcome.updated, 1);
        let leads = store.leads.lock();
        let stored = &leads["5550100100"];
        assert_eq!(stored.star, 3);
        assert_eq!(stored.email.as_deref(), Some("new@x.com"));
        // absent incoming value keeps the stored one
        assert_eq!(stored.tag.as_deref(), Some("cold"));
    }

    #[tokio::test]
    async fn failed_update_chunk_falls_back_per_record() {
        let store = MockLeadStore {
            fail_bulk_updates: true,
            ..Default::default()
        };
        store.seed(candidate("5550100100", 0));
        let company = Uuid::new_v4();

        let outcome = write_batch(
            &store,
            company,
            None,
            batch(vec![], vec![candidate("5550100100", 1), candidate("5550100199", 2)]),
        )
        .await;

        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row, 2);
    }

    #[tokio::test]
    async fn campaign_counter_bumped_by_inserted_only() {
        let store = MockLeadStore::default();
        store.seed(candidate("5550100102", 0));
        let company = Uuid::new_v4();
        let campaign = Uuid::new_v4();

        let outcome = write_batch(
            &store,
            company,
            Some(campaign),
            batch(
                vec![candidate("5550100100", 1), candidate("5550100101", 2)],
                vec![candidate("5550100102", 3)],
            ),
        )
        .await;

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.updated, 1);
        assert_eq!(*store.campaign_bumps.lock(), vec![(campaign, 2)]);
    }

    #[tokio::test]
    async fn no_campaign_bump_without_inserts() {
        let store = MockLeadStore::default();
        store.seed(candidate("5550100100", 0));
        let campaign = Uuid::new_v4();

        let outcome = write_batch(
            &store,
            Uuid::new_v4(),
            Some(campaign),
            batch(vec![], vec![candidate("5550100100", 1)]),
        )
        .await;

        assert_eq!(outcome.updated, 1);
        assert!(store.campaign_bumps.lock().is_empty());
    }
}
