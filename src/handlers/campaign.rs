//! Campaign message handlers
//!
//! Campaigns are managed by admins and managers. Stats are recomputed
//! from the lead store on demand and written back opportunistically, so
//! the stored counters may lag but the stats reply never does.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::types::{
    CampaignStatsResponse, CampaignStatus, CreateCampaignRequest, ErrorResponse,
    ListCampaignsRequest, ListResponse, Request, Role, SuccessResponse, UpdateCampaignRequest,
};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCampaignRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCampaignRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatsRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCampaignLeadRequest {
    pub id: Uuid,
    pub lead_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignLeadsRequest {
    pub id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// The campaign manager must belong to the company and hold a role that
/// can run campaigns. Returns an error message suitable for the client.
async fn validate_manager(
    pool: &PgPool,
    company_id: Uuid,
    manager_id: Uuid,
) -> Result<Option<&'static str>> {
    match queries::user::get_company_user(pool, company_id, manager_id).await? {
        Some(user) if matches!(user.role, Role::Admin | Role::Manager) => Ok(None),
        Some(_) => Ok(Some("Manager must be an admin or manager")),
        None => Ok(Some("Manager not found in this company")),
    }
}

/// Handle campaign.create messages (admin or manager)
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received campaign.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CreateCampaignRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse campaign create request: {}", e);
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

        if !auth_info.can_manage_campaigns() {
            let error = ErrorResponse::new(
                request.id,
                "FORBIDDEN",
                "Only admins and managers can create campaigns",
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

        let mut payload = request.payload.clone();
        payload.name = payload.name.trim().to_string();

        if payload.name.is_empty() {
            let error =
                ErrorResponse::new(request.id, "VALIDATION_ERROR", "Campaign name is required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match validate_manager(&pool, company_id, payload.manager_id).await {
            Ok(None) => {}
            Ok(Some(reason)) => {
                let error = ErrorResponse::new(request.id, "VALIDATION_ERROR", reason);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Database error checking campaign manager: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match queries::campaign::create_campaign(&pool, company_id, auth_info.user_id, &payload)
            .await
        {
            Ok(campaign) => {
                let response = SuccessResponse::new(request.id, campaign);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Created campaign: {}", response.payload.id);
            }
            Err(e) => {
                error!("Failed to create campaign: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle campaign.list messages (any authenticated company member)
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received campaign.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<ListCampaignsRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::campaign::list_campaigns(
            &pool,
            company_id,
            payload.limit,
            payload.offset,
            payload.search.as_deref(),
            payload.status,
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
                error!("Failed to list campaigns: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle campaign.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received campaign.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<GetCampaignRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::campaign::get_campaign(&pool, company_id, request.payload.id).await {
            Ok(Some(campaign)) => {
                let response = SuccessResponse::new(request.id, campaign);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Campaign not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get campaign: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle campaign.update messages (admin or manager)
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received campaign.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<UpdateCampaignRequest> = match serde_json::from_slice(&msg.payload) {
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

        if !auth_info.can_manage_campaigns() {
            let error = ErrorResponse::new(
                request.id,
                "FORBIDDEN",
                "Only admins and managers can update campaigns",
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

        if let Some(manager_id) = request.payload.manager_id {
            match validate_manager(&pool, company_id, manager_id).await {
                Ok(None) => {}
                Ok(Some(reason)) => {
                    let error = ErrorResponse::new(request.id, "VALIDATION_ERROR", reason);
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
                Err(e) => {
                    error!("Database error checking campaign manager: {}", e);
                    let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
            }
        }

        match queries::campaign::update_campaign(&pool, company_id, &request.payload).await {
            Ok(Some(campaign)) => {
                let response = SuccessResponse::new(request.id, campaign);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Campaign not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update campaign: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle campaign.delete messages (admin only). A campaign with leads
/// still attached cannot be deleted.
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received campaign.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<DeleteCampaignRequest> = match serde_json::from_slice(&msg.payload) {
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
                ErrorResponse::new(request.id, "FORBIDDEN", "Only admins can delete campaigns");
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

        match queries::campaign::get_campaign(&pool, company_id, request.payload.id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Campaign not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to load campaign: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match queries::lead::count_campaign_leads(&pool, request.payload.id).await {
            Ok(0) => {}
            Ok(_) => {
                let error = ErrorResponse::new(
                    request.id,
                    "CAMPAIGN_HAS_LEADS",
                    "Cannot delete a campaign that still has leads",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to count campaign leads: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        match queries::campaign::delete_campaign(&pool, company_id, request.payload.id).await {
            Ok(true) => {
                #[derive(serde::Serialize)]
                struct DeleteResult {
                    deleted: bool,
                }
                let response = SuccessResponse::new(request.id, DeleteResult { deleted: true });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(false) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Campaign not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete campaign: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle campaign.stats messages. Counts come fresh from the lead
/// store; the stored counters are refreshed best-effort afterwards.
pub async fn handle_stats(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received campaign.stats message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CampaignStatsRequest> = match serde_json::from_slice(&msg.payload) {
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

        let campaign =
            match queries::campaign::get_campaign(&pool, company_id, request.payload.id).await {
                Ok(Some(campaign)) => campaign,
                Ok(None) => {
                    let error = ErrorResponse::new(request.id, "NOT_FOUND", "Campaign not found");
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
                Err(e) => {
                    error!("Failed to get campaign: {}", e);
                    let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
            };

        let (total, assigned, converted) =
            match queries::lead::campaign_lead_counts(&pool, campaign.id).await {
                Ok(counts) => counts,
                Err(e) => {
                    error!("Failed to count campaign leads: {}", e);
                    let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
            };

        // The reply is computed from live counts either way
        if let Err(e) =
            queries::campaign::update_campaign_stats(&pool, campaign.id, total, assigned, converted)
                .await
        {
            warn!("Failed to persist campaign stats for {}: {}", campaign.id, e);
        }

        let conversion_rate = if total == 0 {
            0.0
        } else {
            (converted as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        };

        let stats = CampaignStatsResponse {
            campaign: campaign.name,
            total_leads: total,
            assigned_leads: assigned,
            unassigned_leads: total - assigned,
            converted_leads: converted,
            revenue: campaign.revenue,
            conversion_rate,
        };

        let response = SuccessResponse::new(request.id, stats);
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}

/// Handle campaign.assign_lead messages (admin or manager). Only an
/// active campaign takes new leads this way.
pub async fn handle_assign_lead(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received campaign.assign_lead message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<AssignCampaignLeadRequest> = match serde_json::from_slice(&msg.payload)
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

        if !auth_info.can_manage_campaigns() {
            let error = ErrorResponse::new(
                request.id,
                "FORBIDDEN",
                "Only admins and managers can assign leads to campaigns",
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

        let campaign =
            match queries::campaign::get_campaign(&pool, company_id, request.payload.id).await {
                Ok(Some(campaign)) => campaign,
                Ok(None) => {
                    let error = ErrorResponse::new(request.id, "NOT_FOUND", "Campaign not found");
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
                Err(e) => {
                    error!("Failed to get campaign: {}", e);
                    let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
            };

        if campaign.status != CampaignStatus::Active {
            let error = ErrorResponse::new(
                request.id,
                "CAMPAIGN_NOT_ACTIVE",
                "Leads can only be assigned to active campaigns",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::lead::set_lead_campaign(
            &pool,
            company_id,
            request.payload.lead_id,
            campaign.id,
        )
        .await
        {
            Ok(Some(lead)) => {
                if let Err(e) = queries::campaign::increment_campaign_total(&pool, campaign.id, 1).await
                {
                    warn!("Failed to bump campaign total for {}: {}", campaign.id, e);
                }
                let response = SuccessResponse::new(request.id, lead);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Lead not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to attach lead to campaign: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle campaign.leads messages
pub async fn handle_leads(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received campaign.leads message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CampaignLeadsRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::campaign::get_campaign(&pool, company_id, request.payload.id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Campaign not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to load campaign: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        }

        let payload = &request.payload;

        match queries::lead::list_campaign_leads(
            &pool,
            company_id,
            payload.id,
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
                error!("Failed to list campaign leads: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
