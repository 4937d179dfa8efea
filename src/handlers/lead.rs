//! Lead message handlers
//!
//! Everything here is company-scoped through the caller's token. The
//! import subject hands off to the batch pipeline in
//! `services::import`; `create` is the single-lead path used by the
//! admin form and the website capture form.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::Engine;
use chrono::Utc;
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::services::import;
use crate::services::import::ImportFatalError;
use crate::types::{
    AssignLeadRequest, CreateLeadRequest, ErrorResponse, FilterLeadsRequest, ImportLeadsRequest,
    Lead, LeadFilter, LeadNote, ListRequest, ListResponse, Request, Role, SuccessResponse,
    UpdateLeadRequest,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLeadRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLeadRequest {
    pub id: Uuid,
}

/// Export reply: the CSV travels inline, base64-encoded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFileResponse {
    pub filename: String,
    pub content_type: String,
    pub file_base64: String,
    pub size_bytes: u64,
}

/// Handle lead.create messages (admin form and website capture).
/// A duplicate phone is a client error here; star increments belong to
/// the batch import alone.
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CreateLeadRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse lead create request: {}", e);
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
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can create leads");
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

        let mut payload = request.payload.clone();
        payload.first_name = payload.first_name.trim().to_string();
        payload.last_name = payload.last_name.trim().to_string();
        payload.phone = payload.phone.trim().to_string();

        if payload.first_name.is_empty() || payload.last_name.is_empty() || payload.phone.is_empty()
        {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                "First name, last name, and phone are required",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::lead::get_lead_by_phone(&pool, company_id, &payload.phone).await {
            Ok(Some(_)) => {
                let error = ErrorResponse::new(
                    request.id,
                    "DUPLICATE_LEAD",
                    "A lead with this phone number already exists",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Database error checking lead phone: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match queries::lead::create_lead(&pool, company_id, &payload).await {
            Ok(lead) => {
                let response = SuccessResponse::new(request.id, lead);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Created lead: {}", response.payload.id);
            }
            Err(e) => {
                error!("Failed to create lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.list messages (any authenticated company member)
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<ListRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse lead list request: {}", e);
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

        let payload = &request.payload;

        match queries::lead::list_leads(
            &pool,
            company_id,
            payload.limit,
            payload.offset,
            payload.search.as_deref(),
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
                error!("Failed to list leads: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<GetLeadRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::lead::get_lead(&pool, company_id, request.payload.id).await {
            Ok(Some(lead)) => {
                let response = SuccessResponse::new(request.id, lead);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.assigned messages: the caller's own queue
pub async fn handle_assigned(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.assigned message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<ListRequest> = match serde_json::from_slice(&msg.payload) {
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

        let payload = &request.payload;

        match queries::lead::list_assigned_leads(
            &pool,
            company_id,
            auth_info.user_id,
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
                error!("Failed to list assigned leads: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.assign messages (admin only). The assignee must be an
/// active salesperson in the same company.
pub async fn handle_assign(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.assign message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<AssignLeadRequest> = match serde_json::from_slice(&msg.payload) {
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
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can assign leads");
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

        match queries::user::get_company_user(&pool, company_id, payload.user_id).await {
            Ok(Some(user)) if user.role == Role::Salesperson && user.is_active => {}
            Ok(Some(_)) => {
                let error = ErrorResponse::new(
                    request.id,
                    "VALIDATION_ERROR",
                    "Assignee must be an active salesperson",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Ok(None) => {
                let error = ErrorResponse::new(
                    request.id,
                    "VALIDATION_ERROR",
                    "Assignee not found in this company",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Database error checking assignee: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match queries::lead::assign_lead(
            &pool,
            company_id,
            payload.id,
            payload.user_id,
            auth_info.user_id,
        )
        .await
        {
            Ok(Some(lead)) => {
                let response = SuccessResponse::new(request.id, lead);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Assigned lead {} to {}", payload.id, payload.user_id);
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to assign lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.update messages. Admins update any lead in the company;
/// salespeople only the leads assigned to them.
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<UpdateLeadRequest> = match serde_json::from_slice(&msg.payload) {
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

        let assignee = match auth_info.role {
            Role::Admin => None,
            Role::Salesperson => Some(auth_info.user_id),
            _ => {
                let error = ErrorResponse::new(
                    request.id,
                    "FORBIDDEN",
                    "Only admins and salespeople can update leads",
                );
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

        let note = request.payload.note.as_ref().map(|text| LeadNote {
            text: text.clone(),
            author: auth_info.user_id,
            timestamp: Utc::now(),
        });

        match queries::lead::update_lead(&pool, company_id, assignee, &request.payload, note).await
        {
            Ok(Some(lead)) => {
                let response = SuccessResponse::new(request.id, lead);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.update_by_salesperson messages. Strict variant of update:
/// the caller must be a salesperson and hold the assignment.
pub async fn handle_update_by_salesperson(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.update_by_salesperson message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<UpdateLeadRequest> = match serde_json::from_slice(&msg.payload) {
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

        if auth_info.role != Role::Salesperson {
            let error = ErrorResponse::new(
                request.id,
                "FORBIDDEN",
                "Only salespeople can use this operation",
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

        // Distinguish a missing lead from someone else's lead
        match queries::lead::get_lead(&pool, company_id, request.payload.id).await {
            Ok(Some(lead)) => {
                if lead.assigned_to != Some(auth_info.user_id) {
                    let error = ErrorResponse::new(
                        request.id,
                        "FORBIDDEN",
                        "You are not assigned to this lead",
                    );
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
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

        let note = request.payload.note.as_ref().map(|text| LeadNote {
            text: text.clone(),
            author: auth_info.user_id,
            timestamp: Utc::now(),
        });

        match queries::lead::update_lead(
            &pool,
            company_id,
            Some(auth_info.user_id),
            &request.payload,
            note,
        )
        .await
        {
            Ok(Some(lead)) => {
                let response = SuccessResponse::new(request.id, lead);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.delete messages (admin only, soft delete)
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<DeleteLeadRequest> = match serde_json::from_slice(&msg.payload) {
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
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can delete leads");
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

        match queries::lead::delete_lead(&pool, company_id, request.payload.id).await {
            Ok(true) => {
                #[derive(Serialize)]
                struct DeleteResult {
                    deleted: bool,
                }
                let response = SuccessResponse::new(request.id, DeleteResult { deleted: true });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(false) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete lead: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.filter messages (admin views)
pub async fn handle_filter(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.filter message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<FilterLeadsRequest> = match serde_json::from_slice(&msg.payload) {
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
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can filter leads");
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

        match queries::lead::filter_leads(
            &pool,
            company_id,
            &payload.filter,
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
                error!("Failed to filter leads: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

fn leads_to_csv(leads: Vec<Lead>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(vec![]);

    writer.write_record([
        "First Name",
        "Last Name",
        "Phone",
        "Alt Phone",
        "Email",
        "Lead Source",
        "Tag",
        "Platform",
        "Activity",
        "Status",
        "Star",
        "Campaign",
        "Assigned To",
        "Created At",
    ])?;

    for lead in leads {
        writer.write_record([
            lead.first_name,
            lead.last_name,
            lead.phone,
            lead.alt_phone.unwrap_or_default(),
            lead.email.unwrap_or_default(),
            lead.lead_source,
            lead.tag.unwrap_or_default(),
            lead.platform.unwrap_or_default(),
            lead.activity.unwrap_or_default(),
            lead.lead_status,
            lead.star.to_string(),
            lead.campaign_id.map(|id| id.to_string()).unwrap_or_default(),
            lead.assigned_to.map(|id| id.to_string()).unwrap_or_default(),
            lead.created_at.to_rfc3339(),
        ])?;
    }

    Ok(writer.into_inner()?)
}

/// Handle lead.export messages. The filtered set is rendered to CSV in
/// memory and returned base64-encoded; the header row matches the
/// spellings the import resolver accepts, so an export re-imports
/// cleanly.
pub async fn handle_export(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.export message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<LeadFilter> = match serde_json::from_slice(&msg.payload) {
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
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can export leads");
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

        let leads = match queries::lead::export_leads(&pool, company_id, &request.payload).await {
            Ok(leads) => leads,
            Err(e) => {
                error!("Failed to load leads for export: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let count = leads.len();
        match leads_to_csv(leads) {
            Ok(bytes) => {
                let payload = ExportFileResponse {
                    filename: format!("leads-{}.csv", Utc::now().format("%Y%m%d-%H%M%S")),
                    content_type: "text/csv".to_string(),
                    file_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
                    size_bytes: bytes.len() as u64,
                };
                let response = SuccessResponse::new(request.id, payload);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                info!("Exported {} leads for company {}", count, company_id);
            }
            Err(e) => {
                error!("Failed to render lead export: {}", e);
                let error = ErrorResponse::new(request.id, "EXPORT_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle lead.import messages (admin only). Hands the staged file to
/// the batch pipeline; known rejections keep their specific codes,
/// anything else collapses to a generic import failure.
pub async fn handle_import(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
    max_file_size: u64,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received lead.import message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<ImportLeadsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse lead import request: {}", e);
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
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can import leads");
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

        info!(
            "Lead import requested by user {} for company {}: {}",
            auth_info.user_id, company_id, request.payload.file.original_name
        );

        match import::run_import(&pool, company_id, max_file_size, &request.payload).await {
            Ok(report) => {
                let response = SuccessResponse::new(request.id, report);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                let error = match e.downcast_ref::<ImportFatalError>() {
                    Some(fatal) => ErrorResponse::new(request.id, fatal.code(), fatal.to_string()),
                    None => {
                        error!("Lead import failed: {}", e);
                        ErrorResponse::new(
                            request.id,
                            "IMPORT_ERROR",
                            "Import failed. Please try with smaller file or check file format.",
                        )
                    }
                };
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
