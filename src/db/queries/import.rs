//! Import-related database queries
//!
//! Bulk primitives for the lead import pipeline: batched existing-phone
//! lookups, multi-row inserts and star-increment updates via UNNEST, and
//! the row-by-row forms the writer falls back to when a chunk fails.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::import::{LeadCandidate, DEFAULT_LEAD_SOURCE};

// =============================================================================
// EXISTING-PHONE LOOKUP
// =============================================================================

/// Phones among `phones` that already belong to a live lead of this
/// company. Callers chunk the input to keep statements bounded.
pub async fn fetch_existing_phones(
    pool: &PgPool,
    company_id: Uuid,
    phones: &[String],
) -> Result<Vec<String>> {
    let existing = sqlx::query_scalar::<_, String>(
        r#"
        SELECT phone FROM leads
        WHERE company_id = $1 AND is_deleted = FALSE AND phone = ANY($2)
        "#,
    )
    .bind(company_id)
    .bind(phones)
    .fetch_all(pool)
    .await?;

    Ok(existing)
}

// =============================================================================
// BULK WRITES
// =============================================================================

/// Insert one chunk of new leads in a single statement. Status, notes
/// and the soft-delete flag take their column defaults; `star` carries
/// the in-file occurrence count.
pub async fn bulk_insert_leads(
    pool: &PgPool,
    company_id: Uuid,
    campaign_id: Option<Uuid>,
    candidates: &[LeadCandidate],
) -> Result<u64> {
    let first_names: Vec<&str> = candidates.iter().map(|c| c.first_name.as_str()).collect();
    let last_names: Vec<&str> = candidates.iter().map(|c| c.last_name.as_str()).collect();
    let emails: Vec<Option<&str>> = candidates.iter().map(|c| c.email.as_deref()).collect();
    let phones: Vec<&str> = candidates.iter().map(|c| c.phone.as_str()).collect();
    let alt_phones: Vec<Option<&str>> = candidates.iter().map(|c| c.alt_phone.as_deref()).collect();
    let sources: Vec<&str> = candidates
        .iter()
        .map(|c| c.lead_source.as_deref().unwrap_or(DEFAULT_LEAD_SOURCE))
        .collect();
    let tags: Vec<Option<&str>> = candidates.iter().map(|c| c.tag.as_deref()).collect();
    let platforms: Vec<Option<&str>> = candidates.iter().map(|c| c.platform.as_deref()).collect();
    let activities: Vec<Option<&str>> = candidates.iter().map(|c| c.activity.as_deref()).collect();
    let stars: Vec<i32> = candidates.iter().map(|c| c.star).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO leads (
            id, company_id, first_name, last_name, email, phone, alt_phone,
            lead_source, tag, platform, activity, campaign_id, star,
            created_at, updated_at
        )
        SELECT
            gen_random_uuid(), $1, t.first_name, t.last_name, t.email, t.phone,
            t.alt_phone, t.lead_source, t.tag, t.platform, t.activity, $2, t.star,
            NOW(), NOW()
        FROM UNNEST(
            $3::text[], $4::text[], $5::text[], $6::text[], $7::text[],
            $8::text[], $9::text[], $10::text[], $11::text[], $12::int[]
        ) AS t(first_name, last_name, email, phone, alt_phone,
               lead_source, tag, platform, activity, star)
        "#,
    )
    .bind(company_id)
    .bind(campaign_id)
    .bind(&first_names)
    .bind(&last_names)
    .bind(&emails)
    .bind(&phones)
    .bind(&alt_phones)
    .bind(&sources)
    .bind(&tags)
    .bind(&platforms)
    .bind(&activities)
    .bind(&stars)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Apply one chunk of duplicate submissions to existing leads: bump
/// `star` by the per-phone occurrence count and refresh the mutable
/// fields from the last occurrence in the file. Returns the number of
/// leads touched.
pub async fn bulk_increment_stars(
    pool: &PgPool,
    company_id: Uuid,
    campaign_id: Option<Uuid>,
    candidates: &[LeadCandidate],
) -> Result<u64> {
    let phones: Vec<&str> = candidates.iter().map(|c| c.phone.as_str()).collect();
    let increments: Vec<i32> = candidates.iter().map(|c| c.star).collect();
    let first_names: Vec<&str> = candidates.iter().map(|c| c.first_name.as_str()).collect();
    let last_names: Vec<&str> = candidates.iter().map(|c| c.last_name.as_str()).collect();
    let emails: Vec<Option<&str>> = candidates.iter().map(|c| c.email.as_deref()).collect();
    let alt_phones: Vec<Option<&str>> = candidates.iter().map(|c| c.alt_phone.as_deref()).collect();
    let sources: Vec<Option<&str>> = candidates.iter().map(|c| c.lead_source.as_deref()).collect();
    let tags: Vec<Option<&str>> = candidates.iter().map(|c| c.tag.as_deref()).collect();
    let platforms: Vec<Option<&str>> = candidates.iter().map(|c| c.platform.as_deref()).collect();
    let activities: Vec<Option<&str>> = candidates.iter().map(|c| c.activity.as_deref()).collect();

    let result = sqlx::query(
        r#"
        UPDATE leads AS l
        SET star = l.star + t.inc,
            first_name = t.first_name,
            last_name = t.last_name,
            email = COALESCE(t.email, l.email),
            alt_phone = COALESCE(t.alt_phone, l.alt_phone),
            lead_source = COALESCE(t.lead_source, l.lead_source),
            tag = COALESCE(t.tag, l.tag),
            platform = COALESCE(t.platform, l.platform),
            activity = COALESCE(t.activity, l.activity),
            campaign_id = COALESCE($2, l.campaign_id),
            updated_at = NOW()
        FROM UNNEST(
            $3::text[], $4::int[], $5::text[], $6::text[], $7::text[],
            $8::text[], $9::text[], $10::text[], $11::text[], $12::text[]
        ) AS t(phone, inc, first_name, last_name, email,
               alt_phone, lead_source, tag, platform, activity)
        WHERE l.company_id = $1 AND l.phone = t.phone AND l.is_deleted = FALSE
        "#,
    )
    .bind(company_id)
    .bind(campaign_id)
    .bind(&phones)
    .bind(&increments)
    .bind(&first_names)
    .bind(&last_names)
    .bind(&emails)
    .bind(&alt_phones)
    .bind(&sources)
    .bind(&tags)
    .bind(&platforms)
    .bind(&activities)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// ROW-BY-ROW FALLBACK
// =============================================================================

/// Single-row insert, used when a bulk chunk fails wholesale. Unique
/// violations surface to the caller, which retries them as updates.
pub async fn insert_import_lead(
    pool: &PgPool,
    company_id: Uuid,
    campaign_id: Option<Uuid>,
    candidate: &LeadCandidate,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO leads (
            id, company_id, first_name, last_name, email, phone, alt_phone,
            lead_source, tag, platform, activity, campaign_id, star,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(&candidate.first_name)
    .bind(&candidate.last_name)
    .bind(&candidate.email)
    .bind(&candidate.phone)
    .bind(&candidate.alt_phone)
    .bind(candidate.lead_source.as_deref().unwrap_or(DEFAULT_LEAD_SOURCE))
    .bind(&candidate.tag)
    .bind(&candidate.platform)
    .bind(&candidate.activity)
    .bind(campaign_id)
    .bind(candidate.star)
    .execute(pool)
    .await?;

    Ok(())
}

/// Single-row form of the star-increment update. Returns whether a
/// live lead with the candidate's phone was found.
pub async fn increment_lead_star(
    pool: &PgPool,
    company_id: Uuid,
    campaign_id: Option<Uuid>,
    candidate: &LeadCandidate,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET star = star + $3,
            first_name = $4,
            last_name = $5,
            email = COALESCE($6, email),
            alt_phone = COALESCE($7, alt_phone),
            lead_source = COALESCE($8, lead_source),
            tag = COALESCE($9, tag),
            platform = COALESCE($10, platform),
            activity = COALESCE($11, activity),
            campaign_id = COALESCE($12, campaign_id),
            updated_at = NOW()
        WHERE company_id = $1 AND phone = $2 AND is_deleted = FALSE
        "#,
    )
    .bind(company_id)
    .bind(&candidate.phone)
    .bind(candidate.star)
    .bind(&candidate.first_name)
    .bind(&candidate.last_name)
    .bind(&candidate.email)
    .bind(&candidate.alt_phone)
    .bind(candidate.lead_source.as_deref())
    .bind(&candidate.tag)
    .bind(&candidate.platform)
    .bind(&candidate.activity)
    .bind(campaign_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
