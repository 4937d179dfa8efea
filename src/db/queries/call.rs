//! Call log database queries

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::call::{CallLog, CreateCallRequest};

const CALL_COLUMNS: &str = r#"
    id, lead_id, user_id, company_id, call_time, duration_seconds,
    call_status, call_type, recording_link, notes, created_at
"#;

/// Record a call against a lead. Call time defaults to now.
pub async fn create_call(
    pool: &PgPool,
    company_id: Uuid,
    user_id: Uuid,
    req: &CreateCallRequest,
) -> Result<CallLog> {
    let query = format!(
        r#"
        INSERT INTO call_logs (
            id, lead_id, user_id, company_id, call_time, duration_seconds,
            call_status, call_type, recording_link, notes, created_at
        )
        VALUES ($1, $2, $3, $4, COALESCE($5, NOW()), $6, $7, $8, $9, $10, NOW())
        RETURNING {}
        "#,
        CALL_COLUMNS
    );
    let call = sqlx::query_as::<_, CallLog>(&query)
        .bind(Uuid::new_v4())
        .bind(req.lead_id)
        .bind(user_id)
        .bind(company_id)
        .bind(req.call_time)
        .bind(req.duration_seconds.unwrap_or(0))
        .bind(&req.call_status)
        .bind(&req.call_type)
        .bind(&req.recording_link)
        .bind(req.notes.as_deref().unwrap_or(""))
        .fetch_one(pool)
        .await?;

    Ok(call)
}

/// Calls recorded against one lead, newest first
pub async fn list_calls_by_lead(
    pool: &PgPool,
    company_id: Uuid,
    lead_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<(Vec<CallLog>, i64)> {
    let query = format!(
        r#"
        SELECT {}
        FROM call_logs
        WHERE company_id = $1 AND lead_id = $2
        ORDER BY call_time DESC
        LIMIT $3 OFFSET $4
        "#,
        CALL_COLUMNS
    );
    let calls = sqlx::query_as::<_, CallLog>(&query)
        .bind(company_id)
        .bind(lead_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM call_logs WHERE company_id = $1 AND lead_id = $2",
    )
    .bind(company_id)
    .bind(lead_id)
    .fetch_one(pool)
    .await?;

    Ok((calls, total))
}

/// Company-wide call listing with optional user, lead and time filters.
/// Serves both the per-salesperson view and the admin overview.
pub async fn list_calls(
    pool: &PgPool,
    company_id: Uuid,
    user_id: Option<Uuid>,
    lead_id: Option<Uuid>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<CallLog>, i64)> {
    let mut conditions = vec!["company_id = $1".to_string()];
    let mut param_count = 1;

    if user_id.is_some() {
        param_count += 1;
        conditions.push(format!("user_id = ${}", param_count));
    }
    if lead_id.is_some() {
        param_count += 1;
        conditions.push(format!("lead_id = ${}", param_count));
    }
    if from.is_some() {
        param_count += 1;
        conditions.push(format!("call_time >= ${}", param_count));
    }
    if to.is_some() {
        param_count += 1;
        conditions.push(format!("call_time <= ${}", param_count));
    }

    let where_clause = conditions.join(" AND ");

    let query = format!(
        r#"
        SELECT {}
        FROM call_logs
        WHERE {}
        ORDER BY call_time DESC
        LIMIT ${} OFFSET ${}
        "#,
        CALL_COLUMNS,
        where_clause,
        param_count + 1,
        param_count + 2
    );

    let count_query = format!("SELECT COUNT(*) FROM call_logs WHERE {}", where_clause);

    let mut query_builder = sqlx::query_as::<_, CallLog>(&query).bind(company_id);
    let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(company_id);

    if let Some(uid) = user_id {
        query_builder = query_builder.bind(uid);
        count_builder = count_builder.bind(uid);
    }
    if let Some(lid) = lead_id {
        query_builder = query_builder.bind(lid);
        count_builder = count_builder.bind(lid);
    }
    if let Some(f) = from {
        query_builder = query_builder.bind(f);
        count_builder = count_builder.bind(f);
    }
    if let Some(t) = to {
        query_builder = query_builder.bind(t);
        count_builder = count_builder.bind(t);
    }

    query_builder = query_builder.bind(limit).bind(offset);

    let calls = query_builder.fetch_all(pool).await?;
    let total = count_builder.fetch_one(pool).await?;

    Ok((calls, total))
}
