use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use whereabouts_storage::{GroupId, GroupRoster, Member, Store, StoreError, User, UserId};

use crate::error::ServiceError;

/// Invite tokens expire this long after issuance.
pub const INVITE_TTL_HOURS: i64 = 24;

/// Sharing flag given to a membership when it is created.
pub const DEFAULT_LOCATION_SHARED: bool = true;

const SECRET_BYTES: usize = 32;
const INVITE_CODE_BYTES: usize = 6;

#[derive(Clone)]
pub struct WhereaboutsServer {
    pub store: Arc<dyn Store>,
}

impl WhereaboutsServer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Load a group with all members, mapping absence to `NotFound`.
    pub async fn load_roster(&self, group_id: &GroupId) -> Result<GroupRoster, ServiceError> {
        self.store
            .get_group_roster(group_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::not_found("group not found"),
                _ => ServiceError::internal(format!("failed to load group: {}", e)),
            })
    }

    /// Resolve a device API key to its user.
    pub async fn authenticate_api_key(&self, api_key: Option<&str>) -> Result<User, ServiceError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ServiceError::unauthorized("missing api key"))?;

        self.store
            .get_user_by_api_key_hash(&hash_secret(api_key))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::unauthorized("invalid api key"),
                _ => ServiceError::internal(format!("failed to resolve api key: {}", e)),
            })
    }
}

/// The caller's membership in `roster`, or `Forbidden`.
pub fn require_membership<'a>(
    roster: &'a GroupRoster,
    user_id: &UserId,
) -> Result<&'a Member, ServiceError> {
    roster
        .member(user_id)
        .ok_or_else(|| ServiceError::forbidden("not a member of this group"))
}

/// 32 random bytes from the OS RNG, hex encoded (64 chars).
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of a secret, hex encoded. Only this form is persisted.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Short static join code, upper-case hex.
pub fn generate_invite_code() -> String {
    let mut bytes = [0u8; INVITE_CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}
