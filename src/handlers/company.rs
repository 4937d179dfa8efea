//! Company message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::types::{CreateCompanyRequest, ErrorResponse, Request, SuccessResponse};

/// Handle company.create messages. Superadmin only; company names are
/// unique across the platform.
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received company.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CreateCompanyRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse company create request: {}", e);
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
                "Only the platform superadmin can create companies",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let mut payload = request.payload.clone();
        payload.name = payload.name.trim().to_string();

        if payload.name.is_empty() {
            let error =
                ErrorResponse::new(request.id, "VALIDATION_ERROR", "Company name is required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::company::get_company_by_name(&pool, &payload.name).await {
            Ok(Some(_)) => {
                let error = ErrorResponse::new(
                    request.id,
                    "DUPLICATE_COMPANY",
                    "A company with this name already exists",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Database error checking company name: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match queries::company::create_company(&pool, &payload).await {
            Ok(company) => {
                let response = SuccessResponse::new(request.id, company);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Created company: {}", response.payload.id);
            }
            Err(e) => {
                error!("Failed to create company: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
