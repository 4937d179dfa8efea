//! Lead database queries
//!
//! Every query is scoped by company and, except where noted, excludes
//! soft-deleted rows.

use anyhow::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::lead::{
    CreateLeadRequest, Lead, LeadFilter, LeadNote, UpdateLeadRequest, LEAD_SOURCE_WEBSITE,
    LEAD_STATUS_ASSIGNED, LEAD_STATUS_CLOSED,
};

const LEAD_COLUMNS: &str = r#"
    id, company_id, first_name, last_name, email, phone, alt_phone,
    lead_source, tag, platform, activity, lead_status,
    campaign_id, assigned_to, assigned_by, expected_value,
    last_contacted_date, next_followup_date, notes, star, is_deleted,
    created_at, updated_at
"#;

/// Create a lead from the admin form or the website capture form.
/// Status, star, notes and the soft-delete flag take their column
/// defaults.
pub async fn create_lead(
    pool: &PgPool,
    company_id: Uuid,
    req: &CreateLeadRequest,
) -> Result<Lead> {
    let query = format!(
        r#"
        INSERT INTO leads (
            id, company_id, first_name, last_name, email, phone, alt_phone,
            lead_source, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
        RETURNING {}
        "#,
        LEAD_COLUMNS
    );
    let lead = sqlx::query_as::<_, Lead>(&query)
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(&req.phone)
        .bind(&req.alt_phone)
        .bind(LEAD_SOURCE_WEBSITE)
        .fetch_one(pool)
        .await?;

    Ok(lead)
}

/// Get lead by ID
pub async fn get_lead(pool: &PgPool, company_id: Uuid, lead_id: Uuid) -> Result<Option<Lead>> {
    let query = format!(
        "SELECT {} FROM leads WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE",
        LEAD_COLUMNS
    );
    let lead = sqlx::query_as::<_, Lead>(&query)
        .bind(lead_id)
        .bind(company_id)
        .fetch_optional(pool)
        .await?;

    Ok(lead)
}

/// Get the live lead holding a normalized phone number, if any
pub async fn get_lead_by_phone(
    pool: &PgPool,
    company_id: Uuid,
    phone: &str,
) -> Result<Option<Lead>> {
    let query = format!(
        "SELECT {} FROM leads WHERE company_id = $1 AND phone = $2 AND is_deleted = FALSE",
        LEAD_COLUMNS
    );
    let lead = sqlx::query_as::<_, Lead>(&query)
        .bind(company_id)
        .bind(phone)
        .fetch_optional(pool)
        .await?;

    Ok(lead)
}

/// List a company's leads, optionally searched by name/phone/email
pub async fn list_leads(
    pool: &PgPool,
    company_id: Uuid,
    limit: i64,
    offset: i64,
    search: Option<&str>,
) -> Result<(Vec<Lead>, i64)> {
    let mut conditions = vec!["company_id = $1 AND is_deleted = FALSE".to_string()];
    let mut param_count = 1;

    if search.is_some() {
        param_count += 1;
        conditions.push(format!(
            "(first_name ILIKE ${n} OR last_name ILIKE ${n} OR phone ILIKE ${n} OR email ILIKE ${n})",
            n = param_count
        ));
    }

    let where_clause = conditions.join(" AND ");

    let query = format!(
        r#"
        SELECT {}
        FROM leads
        WHERE {}
        ORDER BY created_at DESC
        LIMIT ${} OFFSET ${}
        "#,
        LEAD_COLUMNS,
        where_clause,
        param_count + 1,
        param_count + 2
    );

    let count_query = format!("SELECT COUNT(*) FROM leads WHERE {}", where_clause);

    let mut query_builder = sqlx::query_as::<_, Lead>(&query).bind(company_id);
    let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(company_id);

    if let Some(s) = search {
        let pattern = format!("%{}%", s);
        query_builder = query_builder.bind(pattern.clone());
        count_builder = count_builder.bind(pattern);
    }

    query_builder = query_builder.bind(limit).bind(offset);

    let leads = query_builder.fetch_all(pool).await?;
    let total = count_builder.fetch_one(pool).await?;

    Ok((leads, total))
}

/// Leads assigned to one salesperson, newest first
pub async fn list_assigned_leads(
    pool: &PgPool,
    company_id: Uuid,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Lead>, i64)> {
    let query = format!(
        r#"
        SELECT {}
        FROM leads
        WHERE company_id = $1 AND assigned_to = $2 AND is_deleted = FALSE
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        LEAD_COLUMNS
    );
    let leads = sqlx::query_as::<_, Lead>(&query)
        .bind(company_id)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM leads WHERE company_id = $1 AND assigned_to = $2 AND is_deleted = FALSE",
    )
    .bind(company_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok((leads, total))
}

/// Assign a lead to a salesperson and move it to the assigned status
pub async fn assign_lead(
    pool: &PgPool,
    company_id: Uuid,
    lead_id: Uuid,
    user_id: Uuid,
    assigned_by: Uuid,
) -> Result<Option<Lead>> {
    let query = format!(
        r#"
        UPDATE leads
        SET assigned_to = $3, assigned_by = $4, lead_status = '{}', updated_at = NOW()
        WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE
        RETURNING {}
        "#,
        LEAD_STATUS_ASSIGNED, LEAD_COLUMNS
    );
    let lead = sqlx::query_as::<_, Lead>(&query)
        .bind(lead_id)
        .bind(company_id)
        .bind(user_id)
        .bind(assigned_by)
        .fetch_optional(pool)
        .await?;

    Ok(lead)
}

/// Partial lead update. Only provided fields change; a note, when
/// given, is appended to the existing list. When `assignee` is set the
/// update only matches leads assigned to that user.
pub async fn update_lead(
    pool: &PgPool,
    company_id: Uuid,
    assignee: Option<Uuid>,
    req: &UpdateLeadRequest,
    note: Option<LeadNote>,
) -> Result<Option<Lead>> {
    let mut query = format!(
        r#"
        UPDATE leads
        SET
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            email = COALESCE($5, email),
            alt_phone = COALESCE($6, alt_phone),
            lead_source = COALESCE($7, lead_source),
            tag = COALESCE($8, tag),
            platform = COALESCE($9, platform),
            activity = COALESCE($10, activity),
            lead_status = COALESCE($11, lead_status),
            campaign_id = COALESCE($12, campaign_id),
            expected_value = COALESCE($13, expected_value),
            last_contacted_date = COALESCE($14, last_contacted_date),
            next_followup_date = COALESCE($15, next_followup_date),
            notes = notes || COALESCE($16, '[]'::jsonb),
            updated_at = NOW()
        WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE
        "#
    );
    if assignee.is_some() {
        query.push_str(" AND assigned_to = $17");
    }
    query.push_str(&format!(" RETURNING {}", LEAD_COLUMNS));

    let appended = note.map(|n| Json(vec![n]));

    let mut query_builder = sqlx::query_as::<_, Lead>(&query)
        .bind(req.id)
        .bind(company_id)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(&req.alt_phone)
        .bind(&req.lead_source)
        .bind(&req.tag)
        .bind(&req.platform)
        .bind(&req.activity)
        .bind(&req.lead_status)
        .bind(req.campaign_id)
        .bind(req.expected_value)
        .bind(req.last_contacted_date)
        .bind(req.next_followup_date)
        .bind(appended);

    if let Some(user_id) = assignee {
        query_builder = query_builder.bind(user_id);
    }

    let lead = query_builder.fetch_optional(pool).await?;

    Ok(lead)
}

/// Soft-delete a lead
pub async fn delete_lead(pool: &PgPool, company_id: Uuid, lead_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET is_deleted = TRUE, updated_at = NOW()
        WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE
        "#,
    )
    .bind(lead_id)
    .bind(company_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn filter_conditions(filter: &LeadFilter) -> (Vec<String>, usize) {
    let mut conditions = vec!["company_id = $1 AND is_deleted = FALSE".to_string()];
    let mut param_count = 1;

    if filter.status.is_some() {
        param_count += 1;
        conditions.push(format!("lead_status = ${}", param_count));
    }
    if filter.source.is_some() {
        param_count += 1;
        conditions.push(format!("lead_source = ${}", param_count));
    }
    if filter.campaign_id.is_some() {
        param_count += 1;
        conditions.push(format!("campaign_id = ${}", param_count));
    }
    if filter.assigned_to.is_some() {
        param_count += 1;
        conditions.push(format!("assigned_to = ${}", param_count));
    }
    if filter.min_star.is_some() {
        param_count += 1;
        conditions.push(format!("star >= ${}", param_count));
    }
    if filter.from.is_some() {
        param_count += 1;
        conditions.push(format!("created_at >= ${}", param_count));
    }
    if filter.to.is_some() {
        param_count += 1;
        conditions.push(format!("created_at <= ${}", param_count));
    }

    (conditions, param_count)
}

/// Filtered lead listing (admin views). All filters are conjunctive.
pub async fn filter_leads(
    pool: &PgPool,
    company_id: Uuid,
    filter: &LeadFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Lead>, i64)> {
    let (conditions, param_count) = filter_conditions(filter);
    let where_clause = conditions.join(" AND ");

    let query = format!(
        r#"
        SELECT {}
        FROM leads
        WHERE {}
        ORDER BY created_at DESC
        LIMIT ${} OFFSET ${}
        "#,
        LEAD_COLUMNS,
        where_clause,
        param_count + 1,
        param_count + 2
    );

    let count_query = format!("SELECT COUNT(*) FROM leads WHERE {}", where_clause);

    let mut query_builder = sqlx::query_as::<_, Lead>(&query).bind(company_id);
    let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(company_id);

    if let Some(status) = &filter.status {
        query_builder = query_builder.bind(status);
        count_builder = count_builder.bind(status);
    }
    if let Some(source) = &filter.source {
        query_builder = query_builder.bind(source);
        count_builder = count_builder.bind(source);
    }
    if let Some(campaign_id) = filter.campaign_id {
        query_builder = query_builder.bind(campaign_id);
        count_builder = count_builder.bind(campaign_id);
    }
    if let Some(assigned_to) = filter.assigned_to {
        query_builder = query_builder.bind(assigned_to);
        count_builder = count_builder.bind(assigned_to);
    }
    if let Some(min_star) = filter.min_star {
        query_builder = query_builder.bind(min_star);
        count_builder = count_builder.bind(min_star);
    }
    if let Some(from) = filter.from {
        query_builder = query_builder.bind(from);
        count_builder = count_builder.bind(from);
    }
    if let Some(to) = filter.to {
        query_builder = query_builder.bind(to);
        count_builder = count_builder.bind(to);
    }

    query_builder = query_builder.bind(limit).bind(offset);

    let leads = query_builder.fetch_all(pool).await?;
    let total = count_builder.fetch_one(pool).await?;

    Ok((leads, total))
}

/// All leads matching a filter, unpaginated (CSV export)
pub async fn export_leads(
    pool: &PgPool,
    company_id: Uuid,
    filter: &LeadFilter,
) -> Result<Vec<Lead>> {
    let (conditions, _) = filter_conditions(filter);
    let where_clause = conditions.join(" AND ");

    let query = format!(
        r#"
        SELECT {}
        FROM leads
        WHERE {}
        ORDER BY created_at DESC
        "#,
        LEAD_COLUMNS, where_clause
    );

    let mut query_builder = sqlx::query_as::<_, Lead>(&query).bind(company_id);

    if let Some(status) = &filter.status {
        query_builder = query_builder.bind(status);
    }
    if let Some(source) = &filter.source {
        query_builder = query_builder.bind(source);
    }
    if let Some(campaign_id) = filter.campaign_id {
        query_builder = query_builder.bind(campaign_id);
    }
    if let Some(assigned_to) = filter.assigned_to {
        query_builder = query_builder.bind(assigned_to);
    }
    if let Some(min_star) = filter.min_star {
        query_builder = query_builder.bind(min_star);
    }
    if let Some(from) = filter.from {
        query_builder = query_builder.bind(from);
    }
    if let Some(to) = filter.to {
        query_builder = query_builder.bind(to);
    }

    let leads = query_builder.fetch_all(pool).await?;

    Ok(leads)
}

/// Attach a lead to a campaign
pub async fn set_lead_campaign(
    pool: &PgPool,
    company_id: Uuid,
    lead_id: Uuid,
    campaign_id: Uuid,
) -> Result<Option<Lead>> {
    let query = format!(
        r#"
        UPDATE leads
        SET campaign_id = $3, updated_at = NOW()
        WHERE id = $1 AND company_id = $2 AND is_deleted = FALSE
        RETURNING {}
        "#,
        LEAD_COLUMNS
    );
    let lead = sqlx::query_as::<_, Lead>(&query)
        .bind(lead_id)
        .bind(company_id)
        .bind(campaign_id)
        .fetch_optional(pool)
        .await?;

    Ok(lead)
}

/// A campaign's leads, newest first
pub async fn list_campaign_leads(
    pool: &PgPool,
    company_id: Uuid,
    campaign_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Lead>, i64)> {
    let query = format!(
        r#"
        SELECT {}
        FROM leads
        WHERE company_id = $1 AND campaign_id = $2 AND is_deleted = FALSE
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        LEAD_COLUMNS
    );
    let leads = sqlx::query_as::<_, Lead>(&query)
        .bind(company_id)
        .bind(campaign_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM leads WHERE company_id = $1 AND campaign_id = $2 AND is_deleted = FALSE",
    )
    .bind(company_id)
    .bind(campaign_id)
    .fetch_one(pool)
    .await?;

    Ok((leads, total))
}

/// Number of live leads referencing a campaign (delete guard)
pub async fn count_campaign_leads(pool: &PgPool, campaign_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM leads WHERE campaign_id = $1 AND is_deleted = FALSE",
    )
    .bind(campaign_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Recompute a campaign's lead counts from the store: total, assigned,
/// converted (status `closed`).
pub async fn campaign_lead_counts(pool: &PgPool, campaign_id: Uuid) -> Result<(i64, i64, i64)> {
    let query = format!(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE assigned_to IS NOT NULL),
            COUNT(*) FILTER (WHERE lead_status = '{}')
        FROM leads
        WHERE campaign_id = $1 AND is_deleted = FALSE
        "#,
        LEAD_STATUS_CLOSED
    );
    let counts = sqlx::query_as::<_, (i64, i64, i64)>(&query)
        .bind(campaign_id)
        .fetch_one(pool)
        .await?;

    Ok(counts)
}
