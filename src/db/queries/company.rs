//! Company database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::company::{Company, CreateCompanyRequest};

/// Create a new company. The registration number is generated by the
/// database sequence.
pub async fn create_company(pool: &PgPool, req: &CreateCompanyRequest) -> Result<Company> {
    let company = sqlx::query_as::<_, Company>(
        r#"
        INSERT INTO companies (id, name, company_email, location, created_at, updated_at)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        RETURNING
            id, company_no, name, company_email, location, is_active,
            created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(&req.company_email)
    .bind(&req.location)
    .fetch_one(pool)
    .await?;

    Ok(company)
}

/// Get company by ID
pub async fn get_company(pool: &PgPool, company_id: Uuid) -> Result<Option<Company>> {
    let company = sqlx::query_as::<_, Company>(
        r#"
        SELECT
            id, company_no, name, company_email, location, is_active,
            created_at, updated_at
        FROM companies
        WHERE id = $1
        "#,
    )
    .bind(company_id)
    .fetch_optional(pool)
    .await?;

    Ok(company)
}

/// Get company by exact name (duplicate check on create)
pub async fn get_company_by_name(pool: &PgPool, name: &str) -> Result<Option<Company>> {
    let company = sqlx::query_as::<_, Company>(
        r#"
        SELECT
            id, company_no, name, company_email, location, is_active,
            created_at, updated_at
        FROM companies
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(company)
}
