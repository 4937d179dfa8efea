//! Campaign database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::campaign::{
    Campaign, CampaignStatus, CreateCampaignRequest, UpdateCampaignRequest,
};

const CAMPAIGN_COLUMNS: &str = r#"
    id, company_id, name, description, manager_id, agents, pipeline,
    lead_distribution, priority, status, total_leads, assigned_leads,
    converted_leads, revenue, created_by, created_at, updated_at
"#;

/// Create a campaign. Unset classification fields fall back to the
/// platform defaults.
pub async fn create_campaign(
    pool: &PgPool,
    company_id: Uuid,
    created_by: Uuid,
    req: &CreateCampaignRequest,
) -> Result<Campaign> {
    let query = format!(
        r#"
        INSERT INTO campaigns (
            id, company_id, name, description, manager_id, agents, pipeline,
            lead_distribution, priority, status, created_by,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
        RETURNING {}
        "#,
        CAMPAIGN_COLUMNS
    );
    let campaign = sqlx::query_as::<_, Campaign>(&query)
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.manager_id)
        .bind(req.agents.clone().unwrap_or_default())
        .bind(req.pipeline.unwrap_or_default())
        .bind(req.lead_distribution.unwrap_or_default())
        .bind(req.priority.unwrap_or_default())
        .bind(req.status.unwrap_or_default())
        .bind(created_by)
        .fetch_one(pool)
        .await?;

    Ok(campaign)
}

/// Get campaign by ID
pub async fn get_campaign(
    pool: &PgPool,
    company_id: Uuid,
    campaign_id: Uuid,
) -> Result<Option<Campaign>> {
    let query = format!(
        "SELECT {} FROM campaigns WHERE id = $1 AND company_id = $2",
        CAMPAIGN_COLUMNS
    );
    let campaign = sqlx::query_as::<_, Campaign>(&query)
        .bind(campaign_id)
        .bind(company_id)
        .fetch_optional(pool)
        .await?;

    Ok(campaign)
}

/// List a company's campaigns with optional name search and status filter
pub async fn list_campaigns(
    pool: &PgPool,
    company_id: Uuid,
    limit: i64,
    offset: i64,
    search: Option<&str>,
    status: Option<CampaignStatus>,
) -> Result<(Vec<Campaign>, i64)> {
    let mut conditions = vec!["company_id = $1".to_string()];
    let mut param_count = 1;

    if search.is_some() {
        param_count += 1;
        conditions.push(format!("name ILIKE ${}", param_count));
    }
    if status.is_some() {
        param_count += 1;
        conditions.push(format!("status = ${}", param_count));
    }

    let where_clause = conditions.join(" AND ");

    let query = format!(
        r#"
        SELECT {}
        FROM campaigns
        WHERE {}
        ORDER BY created_at DESC
        LIMIT ${} OFFSET ${}
        "#,
        CAMPAIGN_COLUMNS,
        where_clause,
        param_count + 1,
        param_count + 2
    );

    let count_query = format!("SELECT COUNT(*) FROM campaigns WHERE {}", where_clause);

    let mut query_builder = sqlx::query_as::<_, Campaign>(&query).bind(company_id);
    let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(company_id);

    if let Some(s) = search {
        let pattern = format!("%{}%", s);
        query_builder = query_builder.bind(pattern.clone());
        count_builder = count_builder.bind(pattern);
    }
    if let Some(st) = status {
        query_builder = query_builder.bind(st);
        count_builder = count_builder.bind(st);
    }

    query_builder = query_builder.bind(limit).bind(offset);

    let campaigns = query_builder.fetch_all(pool).await?;
    let total = count_builder.fetch_one(pool).await?;

    Ok((campaigns, total))
}

/// Partial campaign update. Only provided fields change.
pub async fn update_campaign(
    pool: &PgPool,
    company_id: Uuid,
    req: &UpdateCampaignRequest,
) -> Result<Option<Campaign>> {
    let query = format!(
        r#"
        UPDATE campaigns
        SET
            name = COALESCE($3, name),
            description = COALESCE($4, description),
            manager_id = COALESCE($5, manager_id),
            agents = COALESCE($6, agents),
            pipeline = COALESCE($7, pipeline),
            lead_distribution = COALESCE($8, lead_distribution),
            priority = COALESCE($9, priority),
            status = COALESCE($10, status),
            updated_at = NOW()
        WHERE id = $1 AND company_id = $2
        RETURNING {}
        "#,
        CAMPAIGN_COLUMNS
    );
    let campaign = sqlx::query_as::<_, Campaign>(&query)
        .bind(req.id)
        .bind(company_id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.manager_id)
        .bind(&req.agents)
        .bind(req.pipeline)
        .bind(req.lead_distribution)
        .bind(req.priority)
        .bind(req.status)
        .fetch_optional(pool)
        .await?;

    Ok(campaign)
}

/// Delete a campaign. The caller checks the lead-reference guard first.
pub async fn delete_campaign(pool: &PgPool, company_id: Uuid, campaign_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM campaigns WHERE id = $1 AND company_id = $2")
        .bind(campaign_id)
        .bind(company_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Persist recomputed lead counts on the campaign row
pub async fn update_campaign_stats(
    pool: &PgPool,
    campaign_id: Uuid,
    total_leads: i64,
    assigned_leads: i64,
    converted_leads: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET total_leads = $2, assigned_leads = $3, converted_leads = $4, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(campaign_id)
    .bind(total_leads)
    .bind(assigned_leads)
    .bind(converted_leads)
    .execute(pool)
    .await?;

    Ok(())
}

/// Best-effort bump of the total-lead counter (import, lead assignment)
pub async fn increment_campaign_total(pool: &PgPool, campaign_id: Uuid, by: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE campaigns
        SET total_leads = total_leads + $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(campaign_id)
    .bind(by)
    .execute(pool)
    .await?;

    Ok(())
}
