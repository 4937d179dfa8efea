//! Refresh token database queries
//!
//! Tokens are stored as SHA-256 digests and rotated on every refresh.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::user::RefreshToken;

/// Store a new refresh token digest for a user
pub async fn insert_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<RefreshToken> {
    let token = sqlx::query_as::<_, RefreshToken>(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING id, user_id, token_hash, expires_at, revoked, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(token)
}

/// Look up a live (not revoked, not expired) token by its digest
pub async fn find_valid_refresh_token(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<RefreshToken>> {
    let token = sqlx::query_as::<_, RefreshToken>(
        r#"
        SELECT id, user_id, token_hash, expires_at, revoked, created_at
        FROM refresh_tokens
        WHERE token_hash = $1 AND revoked = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(token)
}

/// Revoke a token by ID (rotation)
pub async fn revoke_refresh_token(pool: &PgPool, token_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1")
        .bind(token_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Revoke a token by digest (logout). Returns whether anything matched.
pub async fn revoke_refresh_token_by_hash(pool: &PgPool, token_hash: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = $1 AND revoked = FALSE",
    )
    .bind(token_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete tokens that expired more than a week ago. Runs at startup.
pub async fn prune_expired_refresh_tokens(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW() - INTERVAL '7 days'")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
