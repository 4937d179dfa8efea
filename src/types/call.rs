//! Call log types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Call log entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CallLog {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub call_time: DateTime<Utc>,
    pub duration_seconds: i32,
    pub call_status: Option<String>,
    /// "incoming" or "outgoing"
    pub call_type: Option<String>,
    pub recording_link: Option<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Request to record a call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    pub lead_id: Uuid,
    /// Defaults to now when absent
    pub call_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
    pub call_status: Option<String>,
    pub call_type: Option<String>,
    pub recording_link: Option<String>,
    pub notes: Option<String>,
}

/// Admin overview filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCallsRequest {
    pub user_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}
