//! Call log message handlers
//!
//! Call history hangs off leads. Whoever can see a lead's history can
//! append to it: salespeople only for leads assigned to them, everyone
//! else for any lead in their company.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::{self, AuthInfo};
use crate::db::queries;
use crate::types::{
    CreateCallRequest, ErrorResponse, ListCallsRequest, ListResponse, Request, Role,
    SuccessResponse,
};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsByLeadRequest {
    pub lead_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsBySalespersonRequest {
    pub user_id: Uuid,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

enum LeadAccess {
    Allowed,
    NotFound,
    NotAssigned,
}

async fn check_lead_access(
    pool: &PgPool,
    company_id: Uuid,
    lead_id: Uuid,
    auth_info: &AuthInfo,
) -> Result<LeadAccess> {
    let lead = match queries::lead::get_lead(pool, company_id, lead_id).await? {
        Some(lead) => lead,
        None => return Ok(LeadAccess::NotFound),
    };

    if auth_info.role == Role::Salesperson && lead.assigned_to != Some(auth_info.user_id) {
        return Ok(LeadAccess::NotAssigned);
    }

    Ok(LeadAccess::Allowed)
}

/// Handle call.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received call.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CreateCallRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse call create request: {}", e);
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

        let company_id = match auth_info.require_company() {
            Ok(id) => id,
            Err(e) => {
                let error = ErrorResponse::new(request.id, "FORBIDDEN", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match check_lead_access(&pool, company_id, request.payload.lead_id, &auth_info).await {
            Ok(LeadAccess::Allowed) => {}
            Ok(LeadAccess::NotFound) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Ok(LeadAccess::NotAssigned) => {
                let error = ErrorResponse::new(
                    request.id,
                    "FORBIDDEN",
                    "You are not assigned to this lead",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to load lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match queries::call::create_call(&pool, company_id, auth_info.user_id, &request.payload)
            .await
        {
            Ok(call) => {
                let response = SuccessResponse::new(request.id, call);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Logged call: {}", response.payload.id);
            }
            Err(e) => {
                error!("Failed to create call log: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle call.by_lead messages
pub async fn handle_by_lead(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received call.by_lead message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CallsByLeadRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
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

        let company_id = match auth_info.require_company() {
            Ok(id) => id,
            Err(e) => {
                let error = ErrorResponse::new(request.id, "FORBIDDEN", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match check_lead_access(&pool, company_id, request.payload.lead_id, &auth_info).await {
            Ok(LeadAccess::Allowed) => {}
            Ok(LeadAccess::NotFound) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Ok(LeadAccess::NotAssigned) => {
                let error = ErrorResponse::new(
                    request.id,
                    "FORBIDDEN",
                    "You are not assigned to this lead",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to load lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        let payload = &request.payload;

        match queries::call::list_calls_by_lead(
            &pool,
            company_id,
            payload.lead_id,
            payload.limit,
            payload.offset,
        )
        .await
        {
            Ok((items, total)) => {
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
                error!("Failed to list calls for lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle call.by_salesperson messages (admin only)
pub async fn handle_by_salesperson(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received call.by_salesperson message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CallsBySalespersonRequest> = match serde_json::from_slice(&msg.payload)
        {
            Ok(req) => req,
            Err(e) => {
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
                "Only admins can view calls by salesperson",
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

        match queries::call::list_calls(
            &pool,
            company_id,
            Some(payload.user_id),
            None,
            payload.from,
            payload.to,
            payload.limit,
            payload.offset,
        )
        .await
        {
            Ok((items, total)) => {
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
                error!("Failed to list calls by salesperson: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle call.list messages (admin overview)
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received call.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<ListCallsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
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
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can list call logs");
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

        match queries::call::list_calls(
            &pool,
            company_id,
            payload.user_id,
            payload.lead_id,
            payload.from,
            payload.to,
            payload.limit,
            payload.offset,
        )
        .await
        {
            Ok((items, total)) => {
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
                error!("Failed to list calls: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
