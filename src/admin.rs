//! Interactive admin account management.

use anyhow::{bail, Context, Result};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::queries;

const MIN_PASSWORD_LENGTH: usize = 12;

/// Prompt for a password interactively (hidden input), confirm, hash, and
/// upsert the platform superadmin in the database.
pub async fn create_superadmin_interactive(pool: &PgPool, email: &str, name: &str) -> Result<()> {
    validate_email(email)?;

    let password = prompt_password()?;
    validate_password(&password)?;

    let hash = crate::auth::hash_password(&password)?;

    upsert_superadmin(pool, email, name, &hash).await?;

    println!("Superadmin account ready: {email}");
    Ok(())
}

/// Prompt for a new password and overwrite the stored hash for any
/// existing account. Sessions stay valid until their tokens expire.
pub async fn reset_password_interactive(pool: &PgPool, email: &str) -> Result<()> {
    validate_email(email)?;

    let user = queries::user::get_user_by_email(pool, email)
        .await?
        .with_context(|| format!("No account with email {email}"))?;

    let password = prompt_password()?;
    validate_password(&password)?;

    let hash = crate::auth::hash_password(&password)?;

    if !queries::user::set_password(pool, user.id, &hash).await? {
        bail!("Failed to update password for {email}");
    }

    println!("Password updated for {email}");
    Ok(())
}

/// Startup fallback: if SUPERADMIN_PASSWORD_HASH is set and the
/// superadmin row is missing or has an invalid hash, apply the
/// pre-computed hash. This is the automated-deployment path — no
/// plaintext password involved.
pub async fn ensure_superadmin_from_env(pool: &PgPool) {
    let hash = match std::env::var("SUPERADMIN_PASSWORD_HASH") {
        Ok(h) if h.starts_with("$argon2") => h,
        _ => return,
    };

    let email = std::env::var("SUPERADMIN_EMAIL")
        .unwrap_or_else(|_| "superadmin@leadwave.local".to_string());

    let row: Option<(String,)> = sqlx::query_as(
        "SELECT password_hash FROM users WHERE email = $1 AND role = 'superadmin'"
    )
    .bind(&email)
    .fetch_optional(pool)
    .await
    .ok()
    .flatten();

    let needs_update = match &row {
        None => true,
        Some((existing,)) => !existing.starts_with("$argon2"),
    };

    if !needs_update {
        return;
    }

    info!("Applying SUPERADMIN_PASSWORD_HASH for {email}");

    let result = sqlx::query(
        "INSERT INTO users (id, company_id, name, email, role, password_hash, is_active)
         VALUES ($1, NULL, 'Platform Superadmin', $2, 'superadmin', $3, TRUE)
         ON CONFLICT (email) DO UPDATE
         SET password_hash = EXCLUDED.password_hash,
             role = 'superadmin',
             is_active = TRUE,
             updated_at = NOW()"
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&hash)
    .execute(pool)
    .await;

    match result {
        Ok(_) => info!("Superadmin account set via SUPERADMIN_PASSWORD_HASH"),
        Err(e) => tracing::warn!("Failed to apply SUPERADMIN_PASSWORD_HASH: {e}"),
    }
}

fn prompt_password() -> Result<String> {
    let pass = rpassword::prompt_password("Enter password: ")
        .context("Failed to read password")?;
    let confirm = rpassword::prompt_password("Confirm password: ")
        .context("Failed to read password confirmation")?;

    if pass != confirm {
        bail!("Passwords do not match");
    }
    Ok(pass)
}

fn validate_email(email: &str) -> Result<()> {
    if !email.contains('@') || !email.contains('.') {
        bail!("Invalid email address: {email}");
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        bail!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters (got {})",
            password.len()
        );
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        bail!("Password must contain uppercase, lowercase, and a digit");
    }
    Ok(())
}

async fn upsert_superadmin(pool: &PgPool, email: &str, name: &str, hash: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, company_id, name, email, role, password_hash, is_active)
         VALUES ($1, NULL, $2, $3, 'superadmin', $4, TRUE)
         ON CONFLICT (email) DO UPDATE
         SET password_hash = EXCLUDED.password_hash,
             name = EXCLUDED.name,
             role = 'superadmin',
             is_active = TRUE,
             updated_at = NOW()"
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(hash)
    .execute(pool)
    .await
    .context("Failed to upsert superadmin user")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_passes() {
        assert!(validate_email("root@example.com").is_ok());
    }

    #[test]
    fn invalid_email_fails() {
        assert!(validate_email("not-an-email").is_err());
    }

    #[test]
    fn short_password_rejected() {
        assert!(validate_password("Short1").is_err());
    }

    #[test]
    fn weak_password_rejected() {
        assert!(validate_password("alllowercase123").is_err());
    }

    #[test]
    fn strong_password_accepted() {
        assert!(validate_password("StrongPass123!").is_ok());
    }
}
