//! Lead import pipeline.
//!
//! One pipeline run per request: parse the staged file, resolve and
//! validate rows, merge intra-file duplicates, split against the store,
//! write in chunks, report. Row problems accumulate; only a bad file,
//! an oversize upload or a bad campaign reference fails the request.

mod normalizer;
mod parser;
mod reconciler;
mod report;
mod resolver;
mod writer;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::types::campaign::Campaign;
use crate::types::import::{CampaignRef, ImportLeadsRequest, ImportReport};

use parser::{RawRow, SpreadsheetKind};
use writer::{LeadStore, PgLeadStore};

/// Failures that abort the import before any row is written. Each maps
/// to a stable error code for the gateway.
#[derive(Debug, Error)]
pub enum ImportFatalError {
    #[error("File is required")]
    FileRequired,
    #[error("Only CSV and Excel files are allowed")]
    UnsupportedFormat,
    #[error("File too large. Maximum allowed size is {limit_mb} MB")]
    FileTooLarge { limit_mb: u64 },
    #[error("No data found in file")]
    EmptyFile,
    #[error("Invalid campaign selected")]
    InvalidCampaign,
}

impl ImportFatalError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportFatalError::FileRequired => "FILE_REQUIRED",
            ImportFatalError::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ImportFatalError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ImportFatalError::EmptyFile => "EMPTY_FILE",
            ImportFatalError::InvalidCampaign => "INVALID_CAMPAIGN",
        }
    }
}

/// Deletes the staged upload when dropped, whichever way the request
/// leaves the pipeline.
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove staged import file {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Import the staged file for one company. On failure the error
/// downcasts to [`ImportFatalError`] for the known rejections; anything
/// else is an internal fault.
pub async fn run_import(
    pool: &PgPool,
    company_id: Uuid,
    max_file_size: u64,
    request: &ImportLeadsRequest,
) -> Result<ImportReport> {
    if request.file.path.is_empty() {
        return Err(ImportFatalError::FileRequired.into());
    }
    let staged = StagedFile::new(&request.file.path);

    let kind = SpreadsheetKind::from_name(&request.file.original_name)
        .ok_or(ImportFatalError::UnsupportedFormat)?;
    if request.file.size > max_file_size {
        return Err(ImportFatalError::FileTooLarge {
            limit_mb: max_file_size / (1024 * 1024),
        }
        .into());
    }

    let campaign = match request.campaign_id {
        Some(id) => Some(
            queries::campaign::get_campaign(pool, company_id, id)
                .await?
                .ok_or(ImportFatalError::InvalidCampaign)?,
        ),
        None => None,
    };

    let rows = parser::parse_rows(&staged.path, kind)?;
    let store = PgLeadStore::new(pool.clone());
    import_rows(&store, company_id, campaign.as_ref(), rows, request.mapping.as_ref()).await
}

/// Pipeline core behind the file handling. Split out so tests can
/// drive parsed rows against a mock store.
async fn import_rows(
    store: &dyn LeadStore,
    company_id: Uuid,
    campaign: Option<&Campaign>,
    rows: Vec<RawRow>,
    mapping: Option<&HashMap<String, String>>,
) -> Result<ImportReport> {
    if let Some(c) = campaign {
        if !c.status.accepts_imports() {
            return Err(ImportFatalError::InvalidCampaign.into());
        }
    }
    if rows.is_empty() {
        return Err(ImportFatalError::EmptyFile.into());
    }

    let started = Instant::now();
    let total = rows.len() as u32;

    let mut candidates = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let fields = resolver::resolve_row(row, mapping);
        match normalizer::normalize_row(fields, (idx + 1) as u32) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => errors.push(e),
        }
    }

    let merged = reconciler::merge_duplicates(candidates);
    let batch = reconciler::partition(store, company_id, merged).await?;
    info!(
        "Import for company {}: {} rows, {} new, {} existing, {} invalid ({} ms)",
        company_id,
        total,
        batch.to_insert.len(),
        batch.to_update.len(),
        errors.len(),
        started.elapsed().as_millis()
    );

    let campaign_id = campaign.map(|c| c.id);
    let outcome = writer::write_batch(store, company_id, campaign_id, batch).await;
    errors.extend(outcome.errors);

    info!(
        "Import for company {} finished: {} inserted, {} updated, {} skipped ({} ms)",
        company_id,
        outcome.inserted,
        outcome.updated,
        errors.len(),
        started.elapsed().as_millis()
    );

    let campaign_ref = campaign.map(|c| CampaignRef {
        id: c.id,
        name: c.name.clone(),
    });
    Ok(report::build_report(
        total,
        outcome.inserted,
        outcome.updated,
        errors,
        campaign_ref,
    ))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::Utc;

    use super::writer::MockLeadStore;
    use super::*;
    use crate::types::campaign::{CampaignStatus, LeadDistribution, Pipeline, Priority};
    use crate::types::import::ImportFileInfo;

    fn sample_campaign(status: CampaignStatus) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: "Spring Outreach".to_string(),
            description: None,
            manager_id: Uuid::new_v4(),
            agents: Vec::new(),
            pipeline: Pipeline::default(),
            lead_distribution: LeadDistribution::default(),
            priority: Priority::default(),
            status,
            total_leads: 0,
            assigned_leads: 0,
            converted_leads: 0,
            revenue: 0.0,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn unreachable_pool() -> PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(100))
            .connect_lazy("postgres://127.0.0.1:1/leadwave")
            .unwrap()
    }

    fn temp_csv(content: &str) -> String {
        let path = std::env::temp_dir().join(format!("leadwave-import-{}.csv", Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn import_request(path: String, original_name: &str, size: u64) -> ImportLeadsRequest {
        ImportLeadsRequest {
            file: ImportFileInfo {
                path,
                original_name: original_name.to_string(),
                size,
            },
            mapping: None,
            campaign_id: None,
        }
    }

    #[tokio::test]
    async fn dedupes_within_file_and_reports() {
        let store = MockLeadStore::default();
        let rows = parser::parse_csv(
            "First Name,Last Name,Phone,Email\n\
             Jane,Doe,555-010-0100,jane@x.com\n\
             Jane,Doe,555-010-0100,jane2@x.com\n\
             ,Doe,555-010-0101,\n",
        )
        .unwrap();

        let report = import_rows(&store, Uuid::new_v4(), None, rows, None)
            .await
            .unwrap();

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.inserted, 1);
        assert_eq!(report.summary.updated, 0);
        assert_eq!(report.summary.skipped, 1);
        assert!((report.summary.success_rate - 66.67).abs() < 1e-9);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 3);
        assert!(report.errors[0].reason.contains("Missing required field"));

        let leads = store.leads.lock();
        let lead = &leads["5550100100"];
        assert_eq!(lead.star, 2);
        assert_eq!(lead.email.as_deref(), Some("jane2@x.com"));
        assert_eq!(lead.first_name, "Jane");
    }

    fn existing_lead(phone: &str, email: &str) -> crate::types::import::LeadCandidate {
        crate::types::import::LeadCandidate {
            source_row: 0,
            first_name: "Old".to_string(),
            last_name: "Name".to_string(),
            phone: phone.to_string(),
            email: Some(email.to_string()),
            alt_phone: None,
            lead_source: None,
            tag: None,
            platform: None,
            activity: None,
            star: 1,
        }
    }

    #[tokio::test]
    async fn existing_leads_take_star_increments() {
        let store = MockLeadStore::default();
        store.seed(existing_lead("5550100100", "old@x.com"));

        let rows = parser::parse_csv(
            "First Name,Last Name,Phone,Email\n\
             Jane,Doe,5550100100,new@x.com\n\
             Jane,Doe,5550100100,\n",
        )
        .unwrap();

        let report = import_rows(&store, Uuid::new_v4(), None, rows, None)
            .await
            .unwrap();

        assert_eq!(report.summary.inserted, 0);
        assert_eq!(report.summary.updated, 1);
        let leads = store.leads.lock();
        let lead = &leads["5550100100"];
        // existing star 1 plus two occurrences in the file
        assert_eq!(lead.star, 3);
        assert_eq!(lead.email.as_deref(), Some("new@x.com"));
    }

    #[tokio::test]
    async fn reimporting_the_same_file_inserts_nothing() {
        let store = MockLeadStore::default();
        let csv = "First Name,Last Name,Phone\nJane,Doe,5550100100\nJane,Doe,5550100100\n";

        let first = import_rows(
            &store,
            Uuid::new_v4(),
            None,
            parser::parse_csv(csv).unwrap(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(first.summary.inserted, 1);
        assert_eq!(store.leads.lock()["5550100100"].star, 2);

        let second = import_rows(
            &store,
            Uuid::new_v4(),
            None,
            parser::parse_csv(csv).unwrap(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(second.summary.inserted, 0);
        assert_eq!(second.summary.updated, 1);
        assert_eq!(store.leads.lock()["5550100100"].star, 4);
    }

    #[tokio::test]
    async fn completed_campaign_rejected_before_any_row() {
        let store = MockLeadStore::default();
        let campaign = sample_campaign(CampaignStatus::Completed);
        let rows = parser::parse_csv("First Name,Last Name,Phone\nJane,Doe,5550100100\n").unwrap();

        let err = import_rows(&store, campaign.company_id, Some(&campaign), rows, None)
            .await
            .unwrap_err();

        let fatal = err.downcast_ref::<ImportFatalError>().unwrap();
        assert_eq!(fatal.code(), "INVALID_CAMPAIGN");
        assert!(store.leads.lock().is_empty());
    }

    #[tokio::test]
    async fn active_campaign_is_echoed_and_counted() {
        let store = MockLeadStore::default();
        let campaign = sample_campaign(CampaignStatus::Active);
        let rows = parser::parse_csv(
            "First Name,Last Name,Phone\nJane,Doe,5550100100\nJohn,Smith,5550100101\n",
        )
        .unwrap();

        let report = import_rows(&store, campaign.company_id, Some(&campaign), rows, None)
            .await
            .unwrap();

        assert_eq!(report.summary.inserted, 2);
        let echoed = report.campaign.unwrap();
        assert_eq!(echoed.id, campaign.id);
        assert_eq!(echoed.name, "Spring Outreach");
        assert_eq!(*store.campaign_bumps.lock(), vec![(campaign.id, 2)]);
    }

    #[tokio::test]
    async fn empty_rows_rejected() {
        let store = MockLeadStore::default();
        let err = import_rows(&store, Uuid::new_v4(), None, Vec::new(), None)
            .await
            .unwrap_err();
        let fatal = err.downcast_ref::<ImportFatalError>().unwrap();
        assert_eq!(fatal.code(), "EMPTY_FILE");
    }

    #[tokio::test]
    async fn mapping_drives_resolution_end_to_end() {
        let store = MockLeadStore::default();
        let rows = parser::parse_csv(
            "Contact,Surname,Number\nJane,Doe,555-010-0100\n",
        )
        .unwrap();
        let mapping: HashMap<String, String> = [
            ("firstName", "Contact"),
            ("lastName", "Surname"),
            ("phone", "Number"),
            ("leadSource", "Spring Fair"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let report = import_rows(&store, Uuid::new_v4(), None, rows, Some(&mapping))
            .await
            .unwrap();

        assert_eq!(report.summary.inserted, 1);
        let leads = store.leads.lock();
        let lead = &leads["5550100100"];
        assert_eq!(lead.first_name, "Jane");
        // mapping value with no matching column acts as a literal
        assert_eq!(lead.lead_source.as_deref(), Some("Spring Fair"));
    }

    #[tokio::test]
    async fn unsupported_extension_rejected_and_staged_file_removed() {
        let pool = unreachable_pool();
        let path = temp_csv("First Name,Last Name,Phone\nJane,Doe,5550100100\n");
        let request = import_request(path.clone(), "leads.pdf", 10);

        let err = run_import(&pool, Uuid::new_v4(), 100 * 1024 * 1024, &request)
            .await
            .unwrap_err();

        let fatal = err.downcast_ref::<ImportFatalError>().unwrap();
        assert_eq!(fatal.code(), "UNSUPPORTED_FORMAT");
        assert!(!Path::new(&path).exists());
    }

    #[tokio::test]
    async fn oversize_upload_rejected_before_parsing() {
        let pool = unreachable_pool();
        let path = temp_csv("First Name,Last Name,Phone\nJane,Doe,5550100100\n");
        let request = import_request(path.clone(), "leads.csv", 200 * 1024 * 1024);

        let err = run_import(&pool, Uuid::new_v4(), 100 * 1024 * 1024, &request)
            .await
            .unwrap_err();

        let fatal = err.downcast_ref::<ImportFatalError>().unwrap();
        assert_eq!(fatal.code(), "FILE_TOO_LARGE");
        assert!(fatal.to_string().contains("100 MB"));
        assert!(!Path::new(&path).exists());
    }

    #[tokio::test]
    async fn header_only_file_rejected_as_empty() {
        let pool = unreachable_pool();
        let path = temp_csv("First Name,Last Name,Phone\n");
        let request = import_request(path.clone(), "leads.csv", 40);

        let err = run_import(&pool, Uuid::new_v4(), 100 * 1024 * 1024, &request)
            .await
            .unwrap_err();

        let fatal = err.downcast_ref::<ImportFatalError>().unwrap();
        assert_eq!(fatal.code(), "EMPTY_FILE");
        assert!(!Path::new(&path).exists());
    }

    #[tokio::test]
    async fn missing_file_path_rejected() {
        let pool = unreachable_pool();
        let request = import_request(String::new(), "leads.csv", 10);

        let err = run_import(&pool, Uuid::new_v4(), 100 * 1024 * 1024, &request)
            .await
            .unwrap_err();

        let fatal = err.downcast_ref::<ImportFatalError>().unwrap();
        assert_eq!(fatal.code(), "FILE_REQUIRED");
    }

    #[tokio::test]
    async fn staged_file_removed_even_when_pipeline_fails() {
        let pool = unreachable_pool();
        let path = temp_csv("First Name,Last Name,Phone\nJane,Doe,5550100100\n");
        let request = import_request(path.clone(), "leads.csv", 40);

        // no database behind the pool, the pipeline errors past parsing
        let result = run_import(&pool, Uuid::new_v4(), 100 * 1024 * 1024, &request).await;
        assert!(result.is_err());
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn fatal_error_codes_are_stable() {
        assert_eq!(ImportFatalError::FileRequired.code(), "FILE_REQUIRED");
        assert_eq!(ImportFatalError::UnsupportedFormat.code(), "UNSUPPORTED_FORMAT");
        assert_eq!(
            ImportFatalError::FileTooLarge { limit_mb: 100 }.code(),
            "FILE_TOO_LARGE"
        );
        assert_eq!(ImportFatalError::EmptyFile.code(), "EMPTY_FILE");
        assert_eq!(ImportFatalError::InvalidCampaign.code(), "INVALID_CAMPAIGN");
    }
}
