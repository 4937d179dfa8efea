//! Lead import wire types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source assigned to imported leads whose file carried none
pub const DEFAULT_LEAD_SOURCE: &str = "Other";

/// Staged upload metadata, forwarded by the gateway after it writes the
/// file to the shared upload directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFileInfo {
    pub path: String,
    pub original_name: String,
    pub size: u64,
}

/// Import request: the staged file, an optional column mapping
/// (canonical field -> source column name or literal value), and an
/// optional target campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLeadsRequest {
    pub file: ImportFileInfo,
    #[serde(default)]
    pub mapping: Option<HashMap<String, String>>,
    #[serde(default)]
    pub campaign_id: Option<Uuid>,
}

/// A normalized row that survived validation. Intra-file duplicates are
/// merged before the insert/update split, so `star` carries the number
/// of occurrences of this phone in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadCandidate {
    /// 1-based data row of the first occurrence (error reporting)
    pub source_row: u32,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub alt_phone: Option<String>,
    /// `None` when the file carried no source column; inserts default it
    /// to [`DEFAULT_LEAD_SOURCE`], updates leave the stored value alone.
    pub lead_source: Option<String>,
    pub tag: Option<String>,
    pub platform: Option<String>,
    pub activity: Option<String>,
    pub star: i32,
}

/// One rejected or failed row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportError {
    /// 1-based row number in the source file
    pub row: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total: u32,
    pub inserted: u32,
    pub updated: u32,
    pub skipped: u32,
    /// Percentage of rows absorbed (not skipped), two decimals
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRef {
    pub id: Uuid,
    pub name: String,
}

/// Full import report returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub message: String,
    pub summary: ImportSummary,
    /// Truncated: at most the first 50 row errors
    pub errors: Vec<ImportError>,
    pub campaign: Option<CampaignRef>,
}
