//! NATS message handlers

pub mod auth;
pub mod call;
pub mod campaign;
pub mod company;
pub mod lead;
pub mod user;

use std::sync::Arc;
use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tracing::{info, error};
use tokio::select;

use crate::config::Config;
use crate::services::rate_limiter::RateLimiter;

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let jwt_secret = Arc::new(config.jwt_secret.clone());
    let max_import_file_size = config.max_import_file_size;

    // One limiter shared by every login subscriber
    let rate_limiter = Arc::new(RateLimiter::for_login());

    // Subscribe to all subjects
    let login_sub = client.subscribe("leadwave.auth.login").await?;
    let refresh_sub = client.subscribe("leadwave.auth.refresh").await?;
    let logout_sub = client.subscribe("leadwave.auth.logout").await?;

    // Company subjects
    let company_create_sub = client.subscribe("leadwave.company.create").await?;

    // User subjects
    let user_create_admin_sub = client.subscribe("leadwave.user.create_admin").await?;
    let user_create_salesperson_sub = client.subscribe("leadwave.user.create_salesperson").await?;
    let user_list_sub = client.subscribe("leadwave.user.list").await?;

    // Lead subjects
    let lead_create_sub = client.subscribe("leadwave.lead.create").await?;
    let lead_list_sub = client.subscribe("leadwave.lead.list").await?;
    let lead_get_sub = client.subscribe("leadwave.lead.get").await?;
    let lead_assigned_sub = client.subscribe("leadwave.lead.assigned").await?;
    let lead_assign_sub = client.subscribe("leadwave.lead.assign").await?;
    let lead_update_sub = client.subscribe("leadwave.lead.update").await?;
    let lead_update_by_salesperson_sub =
        client.subscribe("leadwave.lead.update_by_salesperson").await?;
    let lead_delete_sub = client.subscribe("leadwave.lead.delete").await?;
    let lead_filter_sub = client.subscribe("leadwave.lead.filter").await?;
    let lead_export_sub = client.subscribe("leadwave.lead.export").await?;
    let lead_import_sub = client.subscribe("leadwave.lead.import").await?;

    // Campaign subjects
    let campaign_create_sub = client.subscribe("leadwave.campaign.create").await?;
    let campaign_list_sub = client.subscribe("leadwave.campaign.list").await?;
    let campaign_get_sub = client.subscribe("leadwave.campaign.get").await?;
    let campaign_update_sub = client.subscribe("leadwave.campaign.update").await?;
    let campaign_delete_sub = client.subscribe("leadwave.campaign.delete").await?;
    let campaign_stats_sub = client.subscribe("leadwave.campaign.stats").await?;
    let campaign_assign_lead_sub = client.subscribe("leadwave.campaign.assign_lead").await?;
    let campaign_leads_sub = client.subscribe("leadwave.campaign.leads").await?;

    // Call subjects
    let call_create_sub = client.subscribe("leadwave.call.create").await?;
    let call_by_lead_sub = client.subscribe("leadwave.call.by_lead").await?;
    let call_by_salesperson_sub = client.subscribe("leadwave.call.by_salesperson").await?;
    let call_list_sub = client.subscribe("leadwave.call.list").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_login = client.clone();
    let client_refresh = client.clone();
    let client_logout = client.clone();

    // Company handler clones
    let client_company_create = client.clone();

    // User handler clones
    let client_user_create_admin = client.clone();
    let client_user_create_salesperson = client.clone();
    let client_user_list = client.clone();

    // Lead handler clones
    let client_lead_create = client.clone();
    let client_lead_list = client.clone();
    let client_lead_get = client.clone();
    let client_lead_assigned = client.clone();
    let client_lead_assign = client.clone();
    let client_lead_update = client.clone();
    let client_lead_update_by_salesperson = client.clone();
    let client_lead_delete = client.clone();
    let client_lead_filter = client.clone();
    let client_lead_export = client.clone();
    let client_lead_import = client.clone();

    // Campaign handler clones
    let client_campaign_create = client.clone();
    let client_campaign_list = client.clone();
    let client_campaign_get = client.clone();
    let client_campaign_update = client.clone();
    let client_campaign_delete = client.clone();
    let client_campaign_stats = client.clone();
    let client_campaign_assign_lead = client.clone();
    let client_campaign_leads = client.clone();

    // Call handler clones
    let client_call_create = client.clone();
    let client_call_by_lead = client.clone();
    let client_call_by_salesperson = client.clone();
    let client_call_list = client.clone();

    // Auth pool clones
    let pool_login = pool.clone();
    let pool_refresh = pool.clone();
    let pool_logout = pool.clone();

    // Company pool clones
    let pool_company_create = pool.clone();

    // User pool clones
    let pool_user_create_admin = pool.clone();
    let pool_user_create_salesperson = pool.clone();
    let pool_user_list = pool.clone();

    // Lead pool clones
    let pool_lead_create = pool.clone();
    let pool_lead_list = pool.clone();
    let pool_lead_get = pool.clone();
    let pool_lead_assigned = pool.clone();
    let pool_lead_assign = pool.clone();
    let pool_lead_update = pool.clone();
    let pool_lead_update_by_salesperson = pool.clone();
    let pool_lead_delete = pool.clone();
    let pool_lead_filter = pool.clone();
    let pool_lead_export = pool.clone();
    let pool_lead_import = pool.clone();

    // Campaign pool clones
    let pool_campaign_create = pool.clone();
    let pool_campaign_list = pool.clone();
    let pool_campaign_get = pool.clone();
    let pool_campaign_update = pool.clone();
    let pool_campaign_delete = pool.clone();
    let pool_campaign_stats = pool.clone();
    let pool_campaign_assign_lead = pool.clone();
    let pool_campaign_leads = pool.clone();

    // Call pool clones
    let pool_call_create = pool.clone();
    let pool_call_by_lead = pool.clone();
    let pool_call_by_salesperson = pool.clone();
    let pool_call_list = pool.clone();

    // JWT secret clones (logout verifies the refresh token alone)
    let secret_login = Arc::clone(&jwt_secret);
    let secret_refresh = Arc::clone(&jwt_secret);
    let secret_company_create = Arc::clone(&jwt_secret);
    let secret_user_create_admin = Arc::clone(&jwt_secret);
    let secret_user_create_salesperson = Arc::clone(&jwt_secret);
    let secret_user_list = Arc::clone(&jwt_secret);
    let secret_lead_create = Arc::clone(&jwt_secret);
    let secret_lead_list = Arc::clone(&jwt_secret);
    let secret_lead_get = Arc::clone(&jwt_secret);
    let secret_lead_assigned = Arc::clone(&jwt_secret);
    let secret_lead_assign = Arc::clone(&jwt_secret);
    let secret_lead_update = Arc::clone(&jwt_secret);
    let secret_lead_update_by_salesperson = Arc::clone(&jwt_secret);
    let secret_lead_delete = Arc::clone(&jwt_secret);
    let secret_lead_filter = Arc::clone(&jwt_secret);
    let secret_lead_export = Arc::clone(&jwt_secret);
    let secret_lead_import = Arc::clone(&jwt_secret);
    let secret_campaign_create = Arc::clone(&jwt_secret);
    let secret_campaign_list = Arc::clone(&jwt_secret);
    let secret_campaign_get = Arc::clone(&jwt_secret);
    let secret_campaign_update = Arc::clone(&jwt_secret);
    let secret_campaign_delete = Arc::clone(&jwt_secret);
    let secret_campaign_stats = Arc::clone(&jwt_secret);
    let secret_campaign_assign_lead = Arc::clone(&jwt_secret);
    let secret_campaign_leads = Arc::clone(&jwt_secret);
    let secret_call_create = Arc::clone(&jwt_secret);
    let secret_call_by_lead = Arc::clone(&jwt_secret);
    let secret_call_by_salesperson = Arc::clone(&jwt_secret);
    let secret_call_list = Arc::clone(&jwt_secret);

    let limiter_login = Arc::clone(&rate_limiter);

    // Spawn handlers
    let login_handle = tokio::spawn(async move {
        auth::handle_login(client_login, login_sub, pool_login, secret_login, limiter_login).await
    });

    let refresh_handle = tokio::spawn(async move {
        auth::handle_refresh(client_refresh, refresh_sub, pool_refresh, secret_refresh).await
    });

    let logout_handle = tokio::spawn(async move {
        auth::handle_logout(client_logout, logout_sub, pool_logout).await
    });

    let company_create_handle = tokio::spawn(async move {
        company::handle_create(client_company_create, company_create_sub, pool_company_create, secret_company_create).await
    });

    let user_create_admin_handle = tokio::spawn(async move {
        user::handle_create_admin(client_user_create_admin, user_create_admin_sub, pool_user_create_admin, secret_user_create_admin).await
    });

    let user_create_salesperson_handle = tokio::spawn(async move {
        user::handle_create_salesperson(client_user_create_salesperson, user_create_salesperson_sub, pool_user_create_salesperson, secret_user_create_salesperson).await
    });

    let user_list_handle = tokio::spawn(async move {
        user::handle_list(client_user_list, user_list_sub, pool_user_list, secret_user_list).await
    });

    let lead_create_handle = tokio::spawn(async move {
        lead::handle_create(client_lead_create, lead_create_sub, pool_lead_create, secret_lead_create).await
    });

    let lead_list_handle = tokio::spawn(async move {
        lead::handle_list(client_lead_list, lead_list_sub, pool_lead_list, secret_lead_list).await
    });

    let lead_get_handle = tokio::spawn(async move {
        lead::handle_get(client_lead_get, lead_get_sub, pool_lead_get, secret_lead_get).await
    });

    let lead_assigned_handle = tokio::spawn(async move {
        lead::handle_assigned(client_lead_assigned, lead_assigned_sub, pool_lead_assigned, secret_lead_assigned).await
    });

    let lead_assign_handle = tokio::spawn(async move {
        lead::handle_assign(client_lead_assign, lead_assign_sub, pool_lead_assign, secret_lead_assign).await
    });

    let lead_update_handle = tokio::spawn(async move {
        lead::handle_update(client_lead_update, lead_update_sub, pool_lead_update, secret_lead_update).await
    });

    let lead_update_by_salesperson_handle = tokio::spawn(async move {
        lead::handle_update_by_salesperson(
            client_lead_update_by_salesperson,
            lead_update_by_salesperson_sub,
            pool_lead_update_by_salesperson,
            secret_lead_update_by_salesperson,
        )
        .await
    });

    let lead_delete_handle = tokio::spawn(async move {
        lead::handle_delete(client_lead_delete, lead_delete_sub, pool_lead_delete, secret_lead_delete).await
    });

    let lead_filter_handle = tokio::spawn(async move {
        lead::handle_filter(client_lead_filter, lead_filter_sub, pool_lead_filter, secret_lead_filter).await
    });

    let lead_export_handle = tokio::spawn(async move {
        lead::handle_export(client_lead_export, lead_export_sub, pool_lead_export, secret_lead_export).await
    });

    let lead_import_handle = tokio::spawn(async move {
        lead::handle_import(
            client_lead_import,
            lead_import_sub,
            pool_lead_import,
            secret_lead_import,
            max_import_file_size,
        )
        .await
    });

    let campaign_create_handle = tokio::spawn(async move {
        campaign::handle_create(client_campaign_create, campaign_create_sub, pool_campaign_create, secret_campaign_create).await
    });

    let campaign_list_handle = tokio::spawn(async move {
        campaign::handle_list(client_campaign_list, campaign_list_sub, pool_campaign_list, secret_campaign_list).await
    });

    let campaign_get_handle = tokio::spawn(async move {
        campaign::handle_get(client_campaign_get, campaign_get_sub, pool_campaign_get, secret_campaign_get).await
    });

    let campaign_update_handle = tokio::spawn(async move {
        campaign::handle_update(client_campaign_update, campaign_update_sub, pool_campaign_update, secret_campaign_update).await
    });

    let campaign_delete_handle = tokio::spawn(async move {
        campaign::handle_delete(client_campaign_delete, campaign_delete_sub, pool_campaign_delete, secret_campaign_delete).await
    });

    let campaign_stats_handle = tokio::spawn(async move {
        campaign::handle_stats(client_campaign_stats, campaign_stats_sub, pool_campaign_stats, secret_campaign_stats).await
    });

    let campaign_assign_lead_handle = tokio::spawn(async move {
        campaign::handle_assign_lead(
            client_campaign_assign_lead,
            campaign_assign_lead_sub,
            pool_campaign_assign_lead,
            secret_campaign_assign_lead,
        )
        .await
    });

    let campaign_leads_handle = tokio::spawn(async move {
        campaign::handle_leads(client_campaign_leads, campaign_leads_sub, pool_campaign_leads, secret_campaign_leads).await
    });

    let call_create_handle = tokio::spawn(async move {
        call::handle_create(client_call_create, call_create_sub, pool_call_create, secret_call_create).await
    });

    let call_by_lead_handle = tokio::spawn(async move {
        call::handle_by_lead(client_call_by_lead, call_by_lead_sub, pool_call_by_lead, secret_call_by_lead).await
    });

    let call_by_salesperson_handle = tokio::spawn(async move {
        call::handle_by_salesperson(
            client_call_by_salesperson,
            call_by_salesperson_sub,
            pool_call_by_salesperson,
            secret_call_by_salesperson,
        )
        .await
    });

    let call_list_handle = tokio::spawn(async move {
        call::handle_list(client_call_list, call_list_sub, pool_call_list, secret_call_list).await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = login_handle => {
            error!("Login handler finished: {:?}", result);
        }
        result = refresh_handle => {
            error!("Refresh handler finished: {:?}", result);
        }
        result = logout_handle => {
            error!("Logout handler finished: {:?}", result);
        }
        result = company_create_handle => {
            error!("Company create handler finished: {:?}", result);
        }
        result = user_create_admin_handle => {
            error!("User create admin handler finished: {:?}", result);
        }
        result = user_create_salesperson_handle => {
            error!("User create salesperson handler finished: {:?}", result);
        }
        result = user_list_handle => {
            error!("User list handler finished: {:?}", result);
        }
        result = lead_create_handle => {
            error!("Lead create handler finished: {:?}", result);
        }
        result = lead_list_handle => {
            error!("Lead list handler finished: {:?}", result);
        }
        result = lead_get_handle => {
            error!("Lead get handler finished: {:?}", result);
        }
        result = lead_assigned_handle => {
            error!("Lead assigned handler finished: {:?}", result);
        }
        result = lead_assign_handle => {
            error!("Lead assign handler finished: {:?}", result);
        }
        result = lead_update_handle => {
            error!("Lead update handler finished: {:?}", result);
        }
        result = lead_update_by_salesperson_handle => {
            error!("Lead update by salesperson handler finished: {:?}", result);
        }
        result = lead_delete_handle => {
            error!("Lead delete handler finished: {:?}", result);
        }
        result = lead_filter_handle => {
            error!("Lead filter handler finished: {:?}", result);
        }
        result = lead_export_handle => {
            error!("Lead export handler finished: {:?}", result);
        }
        result = lead_import_handle => {
            error!("Lead import handler finished: {:?}", result);
        }
        result = campaign_create_handle => {
            error!("Campaign create handler finished: {:?}", result);
        }
        result = campaign_list_handle => {
            error!("Campaign list handler finished: {:?}", result);
        }
        result = campaign_get_handle => {
            error!("Campaign get handler finished: {:?}", result);
        }
        result = campaign_update_handle => {
            error!("Campaign update handler finished: {:?}", result);
        }
        result = campaign_delete_handle => {
            error!("Campaign delete handler finished: {:?}", result);
        }
        result = campaign_stats_handle => {
            error!("Campaign stats handler finished: {:?}", result);
        }
        result = campaign_assign_lead_handle => {
            error!("Campaign assign lead handler finished: {:?}", result);
        }
        result = campaign_leads_handle => {
            error!("Campaign leads handler finished: {:?}", result);
        }
        result = call_create_handle => {
            error!("Call create handler finished: {:?}", result);
        }
        result = call_by_lead_handle => {
            error!("Call by lead handler finished: {:?}", result);
        }
        result = call_by_salesperson_handle => {
            error!("Call by salesperson handler finished: {:?}", result);
        }
        result = call_list_handle => {
            error!("Call list handler finished: {:?}", result);
        }
    }

    Ok(())
}
