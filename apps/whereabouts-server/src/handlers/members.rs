//! Membership handlers: role changes, removal, leaving, sharing flags

use serde::{Deserialize, Serialize};
use tracing::info;
use whereabouts_storage::{
    GroupId, RemoveMemberParams, Role, StoreError, UpdateRoleParams, UserId,
};

use crate::error::ServiceError;
use crate::handlers::enforce;
use crate::handlers::groups::GroupRequest;
use crate::policy::{can_manage_role, can_remove_member, Actor, Target};
use crate::request::{require_principal, Principal, Request};
use crate::server::{require_membership, WhereaboutsServer};
use crate::view::{project_group, GroupView};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub group_id: GroupId,
    pub member_id: UserId,
    /// Wire form: "admin", "co-admin" or "member"
    pub role: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    pub group_id: GroupId,
    pub member_id: UserId,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSharingRequest {
    pub group_id: GroupId,
    pub is_location_shared: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSharingAllRequest {
    pub is_location_shared: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingState {
    pub group_id: GroupId,
    pub is_location_shared: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingUpdate {
    pub updated: u64,
    pub is_location_shared: bool,
}

pub async fn update_member_role(
    server: &WhereaboutsServer,
    request: Request<UpdateRoleRequest>,
) -> Result<GroupView, ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    // Role values are validated before anything else
    let new_role = req
        .role
        .parse::<Role>()
        .map_err(|e| ServiceError::invalid_argument(e.to_string()))?;

    let roster = server.load_roster(&req.group_id).await?;
    let actor = Actor::of(require_membership(&roster, &principal.user_id)?);
    let target = Target::of(
        roster
            .member(&req.member_id)
            .ok_or_else(|| ServiceError::not_found("member not found"))?,
    );

    enforce(
        can_manage_role(&actor, &target, new_role, &roster.group.owner_user_id),
        "update_member_role",
        &req.group_id,
        &actor.user_id,
        Some(&target.user_id),
    )?;

    server
        .store
        .update_membership_role(&UpdateRoleParams {
            group_id: req.group_id.clone(),
            actor: actor.snapshot(),
            target: target.snapshot(),
            new_role,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict => ServiceError::conflict("membership changed, retry"),
            StoreError::NotFound => ServiceError::not_found("member not found"),
            _ => ServiceError::internal(format!("failed to update role: {}", e)),
        })?;

    info!(
        group_id = %req.group_id,
        actor = %actor.user_id,
        target = %target.user_id,
        from = %target.role,
        to = %new_role,
        "member role changed"
    );

    reproject(server, &req.group_id, &principal).await
}

/// Returns the updated group, or `None` when callers removed themselves.
pub async fn remove_member(
    server: &WhereaboutsServer,
    request: Request<RemoveMemberRequest>,
) -> Result<Option<GroupView>, ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    remove(server, &req.group_id, &principal.user_id, &req.member_id).await?;
    if req.member_id == principal.user_id {
        return Ok(None);
    }
    reproject(server, &req.group_id, &principal).await.map(Some)
}

/// Self-removal. The owner cannot leave.
pub async fn leave_group(
    server: &WhereaboutsServer,
    request: Request<GroupRequest>,
) -> Result<(), ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    remove(server, &req.group_id, &principal.user_id, &principal.user_id).await
}

/// Toggle sharing for the caller's own membership in one group.
pub async fn set_location_sharing(
    server: &WhereaboutsServer,
    request: Request<SetSharingRequest>,
) -> Result<SharingState, ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    let membership = server
        .store
        .set_location_shared(&req.group_id, &principal.user_id, req.is_location_shared)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("membership not found"),
            _ => ServiceError::internal(format!("failed to update sharing: {}", e)),
        })?;

    info!(
        group_id = %req.group_id,
        user_id = %principal.user_id,
        shared = membership.is_location_shared,
        "location sharing updated"
    );

    Ok(SharingState {
        group_id: membership.group_id,
        is_location_shared: membership.is_location_shared,
    })
}

/// Apply one sharing flag to every membership of the caller.
pub async fn set_location_sharing_all(
    server: &WhereaboutsServer,
    request: Request<SetSharingAllRequest>,
) -> Result<SharingUpdate, ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    let updated = server
        .store
        .set_location_shared_for_user(&principal.user_id, req.is_location_shared)
        .await
        .map_err(|e| ServiceError::internal(format!("failed to update sharing: {}", e)))?;

    info!(
        user_id = %principal.user_id,
        shared = req.is_location_shared,
        updated,
        "location sharing updated for all groups"
    );

    Ok(SharingUpdate {
        updated,
        is_location_shared: req.is_location_shared,
    })
}

async fn remove(
    server: &WhereaboutsServer,
    group_id: &GroupId,
    actor_id: &UserId,
    member_id: &UserId,
) -> Result<(), ServiceError> {
    let roster = server.load_roster(group_id).await?;
    let actor = Actor::of(require_membership(&roster, actor_id)?);
    let target = Target::of(
        roster
            .member(member_id)
            .ok_or_else(|| ServiceError::not_found("member not found"))?,
    );

    enforce(
        can_remove_member(&actor, &target, &roster.group.owner_user_id),
        "remove_member",
        group_id,
        &actor.user_id,
        Some(&target.user_id),
    )?;

    server
        .store
        .remove_membership(&RemoveMemberParams {
            group_id: group_id.clone(),
            actor: actor.snapshot(),
            target: target.snapshot(),
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict => ServiceError::conflict("membership changed, retry"),
            StoreError::NotFound => ServiceError::not_found("member not found"),
            _ => ServiceError::internal(format!("failed to remove member: {}", e)),
        })?;

    if actor.user_id == target.user_id {
        info!(group_id = %group_id, user_id = %actor.user_id, "member left group");
    } else {
        info!(
            group_id = %group_id,
            actor = %actor.user_id,
            target = %target.user_id,
            "member removed"
        );
    }
    Ok(())
}

async fn reproject(
    server: &WhereaboutsServer,
    group_id: &GroupId,
    principal: &Principal,
) -> Result<GroupView, ServiceError> {
    let roster = server.load_roster(group_id).await?;
    project_group(&roster, &principal.user_id)
        .ok_or_else(|| ServiceError::forbidden("not a member of this group"))
}
