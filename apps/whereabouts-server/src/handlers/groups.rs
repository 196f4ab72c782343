//! Group handlers: create, list, get, rename, delete

use serde::Deserialize;
use tracing::{debug, info, warn};
use whereabouts_storage::{CreateGroupParams, GroupId, StoreError};

use crate::error::ServiceError;
use crate::handlers::enforce;
use crate::policy::{can_delete_group, can_rename, Actor};
use crate::request::{require_principal, Request};
use crate::server::{
    generate_invite_code, require_membership, WhereaboutsServer, DEFAULT_LOCATION_SHARED,
};
use crate::view::{project_group, summarize, GroupSummary, GroupView};

// Retries when a freshly generated invite code collides
const INVITE_CODE_ATTEMPTS: usize = 3;

#[derive(Clone, Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequest {
    pub group_id: GroupId,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameGroupRequest {
    pub group_id: GroupId,
    pub name: String,
}

pub async fn create_group(
    server: &WhereaboutsServer,
    request: Request<CreateGroupRequest>,
) -> Result<GroupView, ServiceError> {
    let principal = require_principal(&request)?;
    let name = group_name(&request.into_inner().name)?;

    let mut attempt = 0;
    let group = loop {
        attempt += 1;
        let result = server
            .store
            .create_group(&CreateGroupParams {
                name: name.clone(),
                owner_user_id: principal.user_id.clone(),
                invite_code: generate_invite_code(),
                owner_location_shared: DEFAULT_LOCATION_SHARED,
            })
            .await;

        match result {
            Ok(group) => break group,
            Err(StoreError::AlreadyExists) if attempt < INVITE_CODE_ATTEMPTS => continue,
            Err(StoreError::NotFound) => return Err(ServiceError::not_found("user not found")),
            Err(e) => {
                return Err(ServiceError::internal(format!(
                    "failed to create group: {}",
                    e
                )))
            }
        }
    };

    info!(group_id = %group.id, owner = %principal.user_id, "group created");

    let roster = server.load_roster(&group.id).await?;
    project_group(&roster, &principal.user_id)
        .ok_or_else(|| ServiceError::internal("creator membership missing"))
}

/// The caller's groups, newest first.
pub async fn list_groups(
    server: &WhereaboutsServer,
    request: Request<()>,
) -> Result<Vec<GroupSummary>, ServiceError> {
    let principal = require_principal(&request)?;

    let rosters = server
        .store
        .list_user_rosters(&principal.user_id)
        .await
        .map_err(|e| ServiceError::internal(format!("failed to list groups: {}", e)))?;

    debug!(user_id = %principal.user_id, count = rosters.len(), "groups listed");
    Ok(rosters
        .iter()
        .filter_map(|roster| summarize(roster, &principal.user_id))
        .collect())
}

pub async fn get_group(
    server: &WhereaboutsServer,
    request: Request<GroupRequest>,
) -> Result<GroupView, ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    let roster = server.load_roster(&req.group_id).await?;
    let view = project_group(&roster, &principal.user_id).ok_or_else(|| {
        warn!(
            group_id = %req.group_id,
            user_id = %principal.user_id,
            "non-member group read denied"
        );
        ServiceError::forbidden("not a member of this group")
    })?;

    debug!(group_id = %req.group_id, user_id = %principal.user_id, "group read");
    Ok(view)
}

pub async fn rename_group(
    server: &WhereaboutsServer,
    request: Request<RenameGroupRequest>,
) -> Result<GroupView, ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();
    let name = group_name(&req.name)?;

    let roster = server.load_roster(&req.group_id).await?;
    let actor = Actor::of(require_membership(&roster, &principal.user_id)?);

    enforce(
        can_rename(&actor),
        "rename_group",
        &req.group_id,
        &actor.user_id,
        None,
    )?;

    server
        .store
        .rename_group(&req.group_id, &actor.snapshot(), &name)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("group not found"),
            StoreError::Conflict => ServiceError::conflict("membership changed, retry"),
            _ => ServiceError::internal(format!("failed to rename group: {}", e)),
        })?;

    info!(group_id = %req.group_id, actor = %actor.user_id, "group renamed");

    let roster = server.load_roster(&req.group_id).await?;
    project_group(&roster, &principal.user_id)
        .ok_or_else(|| ServiceError::forbidden("not a member of this group"))
}

/// Owner only. Memberships and invites go with the group.
pub async fn delete_group(
    server: &WhereaboutsServer,
    request: Request<GroupRequest>,
) -> Result<(), ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    let group = server
        .store
        .get_group(&req.group_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("group not found"),
            _ => ServiceError::internal(format!("failed to get group: {}", e)),
        })?;

    enforce(
        can_delete_group(&principal.user_id, &group.owner_user_id),
        "delete_group",
        &group.id,
        &principal.user_id,
        None,
    )?;

    server
        .store
        .delete_group(&group.id, &principal.user_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("group not found"),
            StoreError::Conflict => ServiceError::conflict("group ownership changed"),
            _ => ServiceError::internal(format!("failed to delete group: {}", e)),
        })?;

    info!(group_id = %group.id, owner = %principal.user_id, "group deleted");
    Ok(())
}

fn group_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid_argument("group name is required"));
    }
    Ok(name.to_string())
}
