//! User handlers: sign-in, profile, API key rotation

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use whereabouts_storage::{StoreError, UpsertUserParams, User, UserId};

use crate::error::ServiceError;
use crate::request::{require_principal, Request};
use crate::server::{generate_secret, hash_secret, WhereaboutsServer};
use crate::view::{location_view, LocationView};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EnsureUserRequest {
    /// Name reported by the identity provider
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub has_api_key: bool,
    pub location: Option<LocationView>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            display_name: user.display_name().to_string(),
            has_api_key: user.has_api_key(),
            location: location_view(user.location.as_ref(), true),
        }
    }
}

/// Returned once; only the hash is kept.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedApiKey {
    pub api_key: String,
}

pub async fn sign_in(
    server: &WhereaboutsServer,
    request: Request<EnsureUserRequest>,
) -> Result<UserProfile, ServiceError> {
    let principal = require_principal(&request)?;
    let req = request.into_inner();

    let user = server
        .store
        .upsert_user(&UpsertUserParams {
            id: principal.user_id.clone(),
            name: req
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        })
        .await
        .map_err(|e| ServiceError::internal(format!("failed to sign in: {}", e)))?;

    info!(user_id = %user.id, "user signed in");
    Ok(UserProfile::from(&user))
}

pub async fn profile(
    server: &WhereaboutsServer,
    request: Request<()>,
) -> Result<UserProfile, ServiceError> {
    let principal = require_principal(&request)?;
    let user = get_user(server, &principal.user_id).await?;

    debug!(user_id = %user.id, "profile read");
    Ok(UserProfile::from(&user))
}

/// Issue a fresh device key. The previous key stops resolving immediately.
pub async fn regenerate_api_key(
    server: &WhereaboutsServer,
    request: Request<()>,
) -> Result<IssuedApiKey, ServiceError> {
    let principal = require_principal(&request)?;
    let api_key = generate_secret();

    server
        .store
        .set_api_key_hash(&principal.user_id, &hash_secret(&api_key))
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::not_found("user not found"),
            _ => ServiceError::internal(format!("failed to store api key: {}", e)),
        })?;

    info!(user_id = %principal.user_id, "api key regenerated");
    Ok(IssuedApiKey { api_key })
}

pub(crate) async fn get_user(
    server: &WhereaboutsServer,
    user_id: &UserId,
) -> Result<User, ServiceError> {
    server.store.get_user(user_id).await.map_err(|e| match e {
        StoreError::NotFound => ServiceError::not_found("user not found"),
        _ => ServiceError::internal(format!("failed to get user: {}", e)),
    })
}
