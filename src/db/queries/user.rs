//! User database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::user::{Role, User};

const USER_COLUMNS: &str = r#"
    id, company_id, name, email, mobile, city, role,
    password_hash, is_active, created_at, updated_at
"#;

/// Create a user. Company is None only for platform superadmins.
pub async fn create_user(
    pool: &PgPool,
    company_id: Option<Uuid>,
    name: &str,
    email: &str,
    mobile: Option<&str>,
    city: Option<&str>,
    role: Role,
    password_hash: &str,
) -> Result<User> {
    let query = format!(
        r#"
        INSERT INTO users (
            id, company_id, name, email, mobile, city, role,
            password_hash, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
        RETURNING {}
        "#,
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&query)
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(name)
        .bind(email)
        .bind(mobile)
        .bind(city)
        .bind(role)
        .bind(password_hash)
        .fetch_one(pool)
        .await?;

    Ok(user)
}

/// Get user by ID
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Get user by email (for login)
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Get a user only if they belong to the given company
pub async fn get_company_user(
    pool: &PgPool,
    company_id: Uuid,
    user_id: Uuid,
) -> Result<Option<User>> {
    let query = format!(
        "SELECT {} FROM users WHERE id = $1 AND company_id = $2",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .bind(company_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// List a company's users, optionally filtered by a name/email search
pub async fn list_users(
    pool: &PgPool,
    company_id: Uuid,
    limit: i64,
    offset: i64,
    search: Option<&str>,
) -> Result<(Vec<User>, i64)> {
    let mut conditions = vec!["company_id = $1".to_string()];
    let mut param_count = 1;

    if search.is_some() {
        param_count += 1;
        conditions.push(format!(
            "(name ILIKE ${n} OR email ILIKE ${n})",
            n = param_count
        ));
    }

    let where_clause = conditions.join(" AND ");

    let query = format!(
        r#"
        SELECT {}
        FROM users
        WHERE {}
        ORDER BY created_at DESC
        LIMIT ${} OFFSET ${}
        "#,
        USER_COLUMNS,
        where_clause,
        param_count + 1,
        param_count + 2
    );

    let count_query = format!("SELECT COUNT(*) FROM users WHERE {}", where_clause);

    let mut query_builder = sqlx::query_as::<_, User>(&query).bind(company_id);
    let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(company_id);

    if let Some(s) = search {
        let pattern = format!("%{}%", s);
        query_builder = query_builder.bind(pattern.clone());
        count_builder = count_builder.bind(pattern);
    }

    query_builder = query_builder.bind(limit).bind(offset);

    let users = query_builder.fetch_all(pool).await?;
    let total = count_builder.fetch_one(pool).await?;

    Ok((users, total))
}

/// Replace a user's password hash
pub async fn set_password(pool: &PgPool, user_id: Uuid, password_hash: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
