//! Lead types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Status set when a lead is assigned to a salesperson. The column is
/// open text; only this and `closed` carry pipeline semantics.
pub const LEAD_STATUS_ASSIGNED: &str = "assigned";
/// Status counted as a conversion in campaign stats
pub const LEAD_STATUS_CLOSED: &str = "closed";

/// Source stamped on leads captured through the website form
pub const LEAD_SOURCE_WEBSITE: &str = "website";

/// One free-form note on a lead
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadNote {
    pub text: String,
    pub author: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Lead entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub company_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub alt_phone: Option<String>,
    pub lead_source: String,
    pub tag: Option<String>,
    pub platform: Option<String>,
    pub activity: Option<String>,
    pub lead_status: String,
    pub campaign_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub expected_value: Option<f64>,
    pub last_contacted_date: Option<DateTime<Utc>>,
    pub next_followup_date: Option<DateTime<Utc>>,
    pub notes: Json<Vec<LeadNote>>,
    /// Duplicate-submission counter: bumped every time an import or form
    /// submission matches this lead's phone.
    pub star: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a lead from the admin form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub alt_phone: Option<String>,
}

/// Partial lead update. Only provided fields change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub alt_phone: Option<String>,
    pub lead_source: Option<String>,
    pub tag: Option<String>,
    pub platform: Option<String>,
    pub activity: Option<String>,
    pub lead_status: Option<String>,
    pub campaign_id: Option<Uuid>,
    pub expected_value: Option<f64>,
    pub last_contacted_date: Option<DateTime<Utc>>,
    pub next_followup_date: Option<DateTime<Utc>>,
    /// Appended to the lead's note list, stamped with the caller and now
    pub note: Option<String>,
}

/// Request to assign a lead to a salesperson
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignLeadRequest {
    pub id: Uuid,
    pub user_id: Uuid,
}

/// Conjunctive lead filters (listing and export)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFilter {
    pub status: Option<String>,
    pub source: Option<String>,
    pub campaign_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    /// Keep leads with `star >= min_star`
    pub min_star: Option<i32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterLeadsRequest {
    #[serde(flatten)]
    pub filter: LeadFilter,
    #[serde(default = "default_filter_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_filter_limit() -> i64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_request_flattens_filter_fields() {
        let json = r#"{"status":"new","minStar":2,"limit":10}"#;
        let request: FilterLeadsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.filter.status.as_deref(), Some("new"));
        assert_eq!(request.filter.min_star, Some(2));
        assert_eq!(request.limit, 10);
        assert_eq!(request.offset, 0);
    }

    #[test]
    fn test_filter_request_defaults() {
        let request: FilterLeadsRequest = serde_json::from_str("{}").unwrap();
        assert!(request.filter.status.is_none());
        assert_eq!(request.limit, 50);
    }
}
