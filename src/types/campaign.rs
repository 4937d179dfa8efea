//! Campaign types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Campaign lifecycle. Leads can only be imported into `Draft` or `Active`
/// campaigns; `assign_lead` additionally requires `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub fn accepts_imports(&self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Active)
    }
}

impl Default for CampaignStatus {
    fn default() -> Self {
        CampaignStatus::Draft
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    Course,
    Service,
    Product,
    Custom,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::Course
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeadDistribution {
    Ondemand,
    Equal,
    Conditional,
}

impl Default for LeadDistribution {
    fn default() -> Self {
        LeadDistribution::Ondemand
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest,
    High,
    Medium,
    Low,
    Lowest,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Campaign entity. The lead-count columns are best-effort counters,
/// recomputed on demand by the stats operation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Uuid,
    pub agents: Vec<Uuid>,
    pub pipeline: Pipeline,
    pub lead_distribution: LeadDistribution,
    pub priority: Priority,
    pub status: CampaignStatus,
    pub total_leads: i64,
    pub assigned_leads: i64,
    pub converted_leads: i64,
    pub revenue: f64,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Uuid,
    pub agents: Option<Vec<Uuid>>,
    pub pipeline: Option<Pipeline>,
    pub lead_distribution: Option<LeadDistribution>,
    pub priority: Option<Priority>,
    pub status: Option<CampaignStatus>,
}

/// Partial campaign update
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub agents: Option<Vec<Uuid>>,
    pub pipeline: Option<Pipeline>,
    pub lead_distribution: Option<LeadDistribution>,
    pub priority: Option<Priority>,
    pub status: Option<CampaignStatus>,
}

/// Listing with an optional status filter on top of the usual pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCampaignsRequest {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
}

fn default_limit() -> i64 {
    50
}

/// Recomputed campaign statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatsResponse {
    pub campaign: String,
    pub total_leads: i64,
    pub assigned_leads: i64,
    pub unassigned_leads: i64,
    pub converted_leads: i64,
    pub revenue: f64,
    /// Percentage, two decimals
    pub conversion_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_gate_by_status() {
        assert!(CampaignStatus::Draft.accepts_imports());
        assert!(CampaignStatus::Active.accepts_imports());
        assert!(!CampaignStatus::Paused.accepts_imports());
        assert!(!CampaignStatus::Completed.accepts_imports());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&CampaignStatus::Completed).unwrap(),
            "\"completed\""
        );
        let parsed: CampaignStatus = serde_json::from_str("\"draft\"").unwrap();
        assert_eq!(parsed, CampaignStatus::Draft);
    }
}
