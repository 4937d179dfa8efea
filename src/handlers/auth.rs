//! Authentication handlers: login, refresh, logout

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::{Duration, Utc};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::services::rate_limiter::RateLimiter;
use crate::types::{
    ErrorResponse, Request, SuccessResponse,
    user::{AuthResponse, User, UserPublic},
};

// =============================================================================
// Auth request types
// =============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Issue a fresh JWT plus a rotated refresh token for the user. The raw
/// refresh token goes to the client; only its digest is stored.
async fn issue_token_pair(pool: &PgPool, user: &User, jwt_secret: &str) -> Result<AuthResponse> {
    let token = auth::generate_token(user.id, &user.email, user.role, user.company_id, jwt_secret)?;
    let (refresh_token, digest) = auth::generate_refresh_token();
    let expires_at = Utc::now() + Duration::days(auth::REFRESH_TOKEN_TTL_DAYS);
    queries::refresh_token::insert_refresh_token(pool, user.id, &digest, expires_at).await?;

    Ok(AuthResponse {
        token,
        refresh_token,
        user: UserPublic::from(user.clone()),
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle auth.login messages
pub async fn handle_login(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
    rate_limiter: Arc<RateLimiter>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.login message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<LoginRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse login request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let payload = &request.payload;

        // Rate limiting check
        if !rate_limiter.check_and_record(&payload.email) {
            warn!("Rate limited login attempt for: {}", payload.email);
            let error = ErrorResponse::new(
                request.id,
                "RATE_LIMITED",
                "Too many login attempts. Please try again later.",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        // Look up user by email. A miss and a wrong password produce the
        // same reply so the two cases cannot be told apart.
        let user = match queries::user::get_user_by_email(&pool, &payload.email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                let error = ErrorResponse::new(
                    request.id,
                    "INVALID_CREDENTIALS",
                    "Invalid email or password",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Database error during login: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match auth::verify_password(&payload.password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                let error = ErrorResponse::new(
                    request.id,
                    "INVALID_CREDENTIALS",
                    "Invalid email or password",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Password verification error: {}", e);
                let error =
                    ErrorResponse::new(request.id, "INTERNAL_ERROR", "Failed to verify password");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        if !user.is_active {
            let error = ErrorResponse::new(request.id, "ACCOUNT_DISABLED", "Account is deactivated");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match issue_token_pair(&pool, &user, &jwt_secret).await {
            Ok(auth_response) => {
                let response = SuccessResponse::new(request.id, auth_response);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("User logged in: {}", response.payload.user.email);
            }
            Err(e) => {
                error!("Failed to issue tokens: {}", e);
                let error =
                    ErrorResponse::new(request.id, "INTERNAL_ERROR", "Failed to complete login");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle auth.refresh messages. Rotation: the presented token is
/// revoked and a replacement issued in the same exchange, so a replayed
/// refresh token always fails.
pub async fn handle_refresh(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.refresh message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RefreshRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse refresh request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let digest = auth::refresh_token_digest(&request.payload.refresh_token);

        let stored = match queries::refresh_token::find_valid_refresh_token(&pool, &digest).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                let error = ErrorResponse::new(
                    request.id,
                    "INVALID_TOKEN",
                    "Refresh token is invalid or expired",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Database error during refresh: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let user = match queries::user::get_user(&pool, stored.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                let error =
                    ErrorResponse::new(request.id, "INVALID_TOKEN", "User no longer exists");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Database error during refresh: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if !user.is_active {
            let error = ErrorResponse::new(request.id, "ACCOUNT_DISABLED", "Account is deactivated");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        // Revoke the presented token before issuing the replacement
        if let Err(e) = queries::refresh_token::revoke_refresh_token(&pool, stored.id).await {
            error!("Failed to revoke refresh token: {}", e);
            let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match issue_token_pair(&pool, &user, &jwt_secret).await {
            Ok(auth_response) => {
                let response = SuccessResponse::new(request.id, auth_response);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Refreshed session for: {}", response.payload.user.email);
            }
            Err(e) => {
                error!("Failed to issue tokens: {}", e);
                let error =
                    ErrorResponse::new(request.id, "INTERNAL_ERROR", "Failed to refresh session");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle auth.logout messages. Revokes the refresh token if it is still
/// live; replies success either way.
pub async fn handle_logout(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.logout message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<LogoutRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse logout request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let digest = auth::refresh_token_digest(&request.payload.refresh_token);

        match queries::refresh_token::revoke_refresh_token_by_hash(&pool, &digest).await {
            Ok(revoked) => {
                #[derive(Serialize)]
                struct LogoutResult {
                    revoked: bool,
                }
                let response = SuccessResponse::new(request.id, LogoutResult { revoked });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Database error during logout: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
