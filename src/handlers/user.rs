//! User provisioning handlers
//!
//! Superadmins create company admins; admins create salespeople in
//! their own company. Password hashes never leave this module.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::types::{
    user::{CreateAdminRequest, CreateSalespersonRequest, Role, UserPublic},
    ErrorResponse, ListRequest, ListResponse, Request, SuccessResponse,
};

/// Handle user.create_admin messages (superadmin only)
pub async fn handle_create_admin(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received user.create_admin message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CreateAdminRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse create admin request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match auth::extract_auth(&request, &jwt_secret) {
            Ok(info) => info,
            Err(_) => {
                let error =
                    ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if !auth_info.is_superadmin() {
            let error = ErrorResponse::new(
                request.id,
                "FORBIDDEN",
                "Only the platform superadmin can create company admins",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let payload = &request.payload;

        if payload.name.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                "Name, email, and password are required",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if payload.password.len() < 8 {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                "Password must be at least 8 characters",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        // The target company must exist
        match queries::company::get_company(&pool, payload.company_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Company not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Database error checking company: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match queries::user::get_user_by_email(&pool, &payload.email).await {
            Ok(Some(_)) => {
                let error = ErrorResponse::new(
                    request.id,
                    "DUPLICATE_EMAIL",
                    "Email is already registered",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Database error checking email: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        let password_hash = match auth::hash_password(&payload.password) {
            Ok(hash) => hash,
            Err(e) => {
                error!("Failed to hash password: {}", e);
                let error =
                    ErrorResponse::new(request.id, "INTERNAL_ERROR", "Failed to process password");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::user::create_user(
            &pool,
            Some(payload.company_id),
            &payload.name,
            &payload.email,
            payload.mobile.as_deref(),
            payload.city.as_deref(),
            Role::Admin,
            &password_hash,
        )
        .await
        {
            Ok(user) => {
                let response = SuccessResponse::new(request.id, UserPublic::from(user));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Created admin: {}", response.payload.email);
            }
            Err(e) => {
                error!("Failed to create admin: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle user.create_salesperson messages (admin only, own company)
pub async fn handle_create_salesperson(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received user.create_salesperson message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CreateSalespersonRequest> = match serde_json::from_slice(&msg.payload)
        {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse create salesperson request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match auth::extract_auth(&request, &jwt_secret) {
            Ok(info) => info,
            Err(_) => {
                let error =
                    ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if !auth_info.is_admin() {
            let error = ErrorResponse::new(
                request.id,
                "FORBIDDEN",
                "Only admins can create salespeople",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let company_id = match auth_info.require_company() {
            Ok(id) => id,
            Err(e) => {
                let error = ErrorResponse::new(request.id, "FORBIDDEN", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let payload = &request.payload;

        if payload.name.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                "Name, email, and password are required",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if payload.password.len() < 8 {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                "Password must be at least 8 characters",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::user::get_user_by_email(&pool, &payload.email).await {
            Ok(Some(_)) => {
                let error = ErrorResponse::new(
                    request.id,
                    "DUPLICATE_EMAIL",
                    "Email is already registered",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Database error checking email: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        let password_hash = match auth::hash_password(&payload.password) {
            Ok(hash) => hash,
            Err(e) => {
                error!("Failed to hash password: {}", e);
                let error =
                    ErrorResponse::new(request.id, "INTERNAL_ERROR", "Failed to process password");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::user::create_user(
            &pool,
            Some(company_id),
            &payload.name,
            &payload.email,
            payload.mobile.as_deref(),
            payload.city.as_deref(),
            Role::Salesperson,
            &password_hash,
        )
        .await
        {
            Ok(user) => {
                let response = SuccessResponse::new(request.id, UserPublic::from(user));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Created salesperson: {}", response.payload.email);
            }
            Err(e) => {
                error!("Failed to create salesperson: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle user.list messages (admin only, own company)
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received user.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<ListRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse user list request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match auth::extract_auth(&request, &jwt_secret) {
            Ok(info) => info,
            Err(_) => {
                let error =
                    ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if !auth_info.is_admin() {
            let error =
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can list users");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let company_id = match auth_info.require_company() {
            Ok(id) => id,
            Err(e) => {
                let error = ErrorResponse::new(request.id, "FORBIDDEN", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let payload = &request.payload;

        match queries::user::list_users(
            &pool,
            company_id,
            payload.limit,
            payload.offset,
            payload.search.as_deref(),
        )
        .await
        {
            Ok((users, total)) => {
                let items: Vec<UserPublic> = users.into_iter().map(UserPublic::from).collect();
                let response = SuccessResponse::new(
                    request.id,
                    ListResponse {
                        items,
                        total,
                        limit: payload.limit,
                        offset: payload.offset,
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list users: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
