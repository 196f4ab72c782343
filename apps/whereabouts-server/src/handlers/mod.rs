//! Handler functions organized by domain:
//! - users: sign-in, profile, API key rotation
//! - locations: device location reports
//! - groups: group CRUD and the caller's dashboard
//! - members: role changes, removal, leaving, sharing flags
//! - invites: token issuance, previews, joining
//!
//! Every handler validates input and runs the authorization rules before
//! touching the store.

pub mod groups;
pub mod invites;
pub mod locations;
pub mod members;
pub mod users;

use tracing::warn;
use whereabouts_storage::{GroupId, UserId};

use crate::error::ServiceError;
use crate::policy::Decision;

/// Log a denial, then turn the decision into `Forbidden` or `Ok`.
pub(crate) fn enforce(
    decision: Decision,
    operation: &'static str,
    group_id: &GroupId,
    actor: &UserId,
    target: Option<&UserId>,
) -> Result<(), ServiceError> {
    if let Decision::Deny(reason) = decision {
        match target {
            Some(target) => {
                warn!(operation, %group_id, %actor, %target, %reason, "authorization denied")
            }
            None => warn!(operation, %group_id, %actor, %reason, "authorization denied"),
        }
    }
    decision.into_result()
}
