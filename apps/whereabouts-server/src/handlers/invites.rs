//! Invite handlers: issue, preview, join

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use whereabouts_storage::{
    CreateInviteParams, Group, GroupId, JoinGroupParams, Role, StoreError, UserId,
};

use crate::error::ServiceError;
use crate::handlers::enforce;
use crate::handlers::groups::GroupRequest;
use crate::policy::{can_issue_invite, Actor};
use crate::request::{require_principal, Request};
use crate::server::{
    generate_secret, hash_secret, require_membership, WhereaboutsServer,
    DEFAULT_LOCATION_SHARED, INVITE_TTL_HOURS,
};
use crate::view::GroupPreview;

#[derive(Clone, Debug, Deserialize)]
pub struct InviteTokenRequest {
    pub token: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InviteCodeRequest {
    pub code: String,
}

/// The plaintext token is only ever returned here.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedInvite {
    pub token: String,
    pub group_id: GroupId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub group: GroupPreview,
    pub role: Role,
    pub is_location_shared: bool,
    /// False when the caller was already a member
    pub created: bool,
}

pub async fn create_invite(
    server: &WhereaboutsServer,
    request: Request<GroupRequest>,
) -> Result<IssuedInvite, ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    let roster = server.load_roster(&req.group_id).await?;
    let actor = Actor::of(require_membership(&roster, &principal.user_id)?);

    enforce(
        can_issue_invite(&actor),
        "create_invite",
        &req.group_id,
        &actor.user_id,
        None,
    )?;

    let token = generate_secret();
    let expires_at = Utc::now() + Duration::hours(INVITE_TTL_HOURS);

    let invite = server
        .store
        .create_invite(&CreateInviteParams {
            group_id: req.group_id.clone(),
            token_hash: hash_secret(&token),
            issuer: actor.snapshot(),
            expires_at,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict => ServiceError::conflict("membership changed, retry"),
            StoreError::NotFound => ServiceError::not_found("group not found"),
            _ => ServiceError::internal(format!("failed to create invite: {}", e)),
        })?;

    info!(
        group_id = %invite.group_id,
        invite_id = %invite.id,
        issuer = %actor.user_id,
        "invite issued"
    );

    Ok(IssuedInvite {
        token,
        group_id: invite.group_id,
        expires_at: invite.expires_at,
    })
}

/// Open to anyone holding the token; reveals only the group's id and name.
pub async fn preview_invite(
    server: &WhereaboutsServer,
    request: Request<InviteTokenRequest>,
) -> Result<GroupPreview, ServiceError> {
    let group = resolve_token(server, &request.into_inner().token).await?;
    debug!(group_id = %group.id, "invite previewed");
    Ok(GroupPreview::from(&group))
}

pub async fn preview_invite_code(
    server: &WhereaboutsServer,
    request: Request<InviteCodeRequest>,
) -> Result<GroupPreview, ServiceError> {
    let group = resolve_code(server, &request.into_inner().code).await?;
    debug!(group_id = %group.id, "invite code previewed");
    Ok(GroupPreview::from(&group))
}

/// Tokens stay valid for other users until they expire.
pub async fn join_by_token(
    server: &WhereaboutsServer,
    request: Request<InviteTokenRequest>,
) -> Result<JoinOutcome, ServiceError> {
    let principal = require_principal(&request)?;
    let group = resolve_token(server, &request.into_inner().token).await?;
    join(server, group, &principal.user_id).await
}

pub async fn join_by_code(
    server: &WhereaboutsServer,
    request: Request<InviteCodeRequest>,
) -> Result<JoinOutcome, ServiceError> {
    let principal = require_principal(&request)?;
    let group = resolve_code(server, &request.into_inner().code).await?;
    join(server, group, &principal.user_id).await
}

async fn join(
    server: &WhereaboutsServer,
    group: Group,
    user_id: &UserId,
) -> Result<JoinOutcome, ServiceError> {
    // An existing membership is returned as-is, role untouched
    let (membership, created) = server
        .store
        .join_group(&JoinGroupParams {
            group_id: group.id.clone(),
            user_id: user_id.clone(),
            is_location_shared: DEFAULT_LOCATION_SHARED,
        })
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("group not found"),
            _ => ServiceError::internal(format!("failed to join group: {}", e)),
        })?;

    if created {
        info!(group_id = %group.id, user_id = %user_id, "member joined");
    } else {
        debug!(group_id = %group.id, user_id = %user_id, "join repeated by existing member");
    }

    Ok(JoinOutcome {
        group: GroupPreview::from(&group),
        role: membership.role,
        is_location_shared: membership.is_location_shared,
        created,
    })
}

/// Absent and expired tokens are indistinguishable to the caller.
async fn resolve_token(server: &WhereaboutsServer, token: &str) -> Result<Group, ServiceError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ServiceError::invalid_argument("invite token is required"));
    }

    let invite = server
        .store
        .get_invite_by_token_hash(&hash_secret(token))
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("invite not found"),
            _ => ServiceError::internal(format!("failed to get invite: {}", e)),
        })?;

    if invite.is_expired(Utc::now()) {
        debug!(invite_id = %invite.id, "expired invite presented");
        return Err(ServiceError::not_found("invite not found"));
    }

    server
        .store
        .get_group(&invite.group_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("invite not found"),
            _ => ServiceError::internal(format!("failed to get group: {}", e)),
        })
}

async fn resolve_code(server: &WhereaboutsServer, code: &str) -> Result<Group, ServiceError> {
    // Codes are issued upper-case; accept any case
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ServiceError::invalid_argument("invite code is required"));
    }

    server
        .store
        .get_group_by_invite_code(&code)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("invite code not found"),
            _ => ServiceError::internal(format!("failed to get group: {}", e)),
        })
}
