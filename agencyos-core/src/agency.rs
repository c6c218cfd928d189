//! Which agency a user acts for, and scoped lookups that refuse objects of other agencies.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::contract::{PlanStore, StoreError};
use crate::error::PlannerError;
use crate::models::{
    Agency, AgencyId, AttachedFile, Campaign, CampaignId, Client, FileId, Post, PostId,
    StorageSession, UserContext,
};

/// The agency owned by the user, or else the agency of the client linked to the user.
pub async fn resolve_agency_for(
    store: &dyn PlanStore,
    user: &UserContext,
) -> Result<Option<Agency>, StoreError> {
    if let Some(agency) = store.agency_owned_by(user.user_id).await? {
        debug!(user_id = user.user_id, agency_id = agency.id, "Resolved owned agency");
        return Ok(Some(agency));
    }
    let Some(client_id) = user.linked_client_id else {
        debug!(user_id = user.user_id, "User has no agency");
        return Ok(None);
    };
    let Some(client) = store.client(client_id).await? else {
        warn!(user_id = user.user_id, client_id, "Linked client does not exist");
        return Ok(None);
    };
    let agency = store.agency(client.agency_id).await?;
    debug!(
        user_id = user.user_id,
        client_id,
        agency_id = ?agency.as_ref().map(|a| a.id),
        "Resolved agency through linked client"
    );
    Ok(agency)
}

/// A campaign together with the client it belongs to.
#[derive(Debug, Clone)]
pub struct CampaignScope {
    pub client: Client,
    pub campaign: Campaign,
}

/// A post with its campaign and client.
#[derive(Debug, Clone)]
pub struct PostScope {
    pub client: Client,
    pub campaign: Campaign,
    pub post: Post,
}

pub async fn client_in_agency(
    store: &dyn PlanStore,
    agency_id: AgencyId,
    client_id: u64,
) -> Result<Client, PlannerError> {
    let client = store
        .client(client_id)
        .await?
        .ok_or_else(|| PlannerError::not_found("client", client_id))?;
    if client.agency_id != agency_id {
        return Err(PlannerError::WrongAgency {
            kind: "client",
            id: client_id,
        });
    }
    Ok(client)
}

pub async fn campaign_in_agency(
    store: &dyn PlanStore,
    agency_id: AgencyId,
    campaign_id: CampaignId,
) -> Result<CampaignScope, PlannerError> {
    let campaign = store
        .campaign(campaign_id)
        .await?
        .ok_or_else(|| PlannerError::not_found("campaign", campaign_id))?;
    let client = store
        .client(campaign.client_id)
        .await?
        .ok_or_else(|| PlannerError::not_found("client", campaign.client_id))?;
    if client.agency_id != agency_id {
        return Err(PlannerError::WrongAgency {
            kind: "campaign",
            id: campaign_id,
        });
    }
    Ok(CampaignScope { client, campaign })
}

pub async fn post_in_agency(
    store: &dyn PlanStore,
    agency_id: AgencyId,
    post_id: PostId,
) -> Result<PostScope, PlannerError> {
    let post = store
        .post(post_id)
        .await?
        .ok_or_else(|| PlannerError::not_found("post", post_id))?;
    let scope = campaign_in_agency(store, agency_id, post.campaign_id)
        .await
        .map_err(|e| match e {
            PlannerError::WrongAgency { .. } => PlannerError::WrongAgency {
                kind: "post",
                id: post_id,
            },
            other => other,
        })?;
    Ok(PostScope {
        client: scope.client,
        campaign: scope.campaign,
        post,
    })
}

pub async fn file_in_agency(
    store: &dyn PlanStore,
    agency_id: AgencyId,
    file_id: FileId,
) -> Result<(AttachedFile, PostScope), PlannerError> {
    let file = store
        .file(file_id)
        .await?
        .ok_or_else(|| PlannerError::not_found("file", file_id))?;
    let scope = post_in_agency(store, agency_id, file.post_id)
        .await
        .map_err(|e| match e {
            PlannerError::WrongAgency { .. } => PlannerError::WrongAgency {
                kind: "file",
                id: file_id,
            },
            other => other,
        })?;
    Ok((file, scope))
}

/// Creates or replaces the agency's storage session. Tokens are stored as given.
pub async fn connect_storage(
    store: &dyn PlanStore,
    agency_id: AgencyId,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<StorageSession, PlannerError> {
    if store.agency(agency_id).await?.is_none() {
        return Err(PlannerError::not_found("agency", agency_id));
    }
    let session = StorageSession {
        agency_id,
        access_token,
        refresh_token,
        expires_at,
    };
    store.save_storage_session(&session).await?;
    info!(agency_id, expires_at = ?session.expires_at, "Storage connected");
    Ok(session)
}

pub async fn disconnect_storage(store: &dyn PlanStore, agency_id: AgencyId) -> Result<(), PlannerError> {
    store.delete_storage_session(agency_id).await?;
    info!(agency_id, "Storage disconnected");
    Ok(())
}
