//! Invite types.

use chrono::{DateTime, Utc};

use super::{GroupId, InviteId, MembershipSnapshot, UserId};

/// Invite token record. Multi-redeemable until it expires.
#[derive(Clone, Debug)]
pub struct Invite {
    pub id: InviteId,
    pub group_id: GroupId,
    pub token_hash: String, // SHA-256 (hex) of the token handed to the issuer
    pub created_by_user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Parameters for creating an invite
#[derive(Clone, Debug)]
pub struct CreateInviteParams {
    pub group_id: GroupId,
    pub token_hash: String,
    pub issuer: MembershipSnapshot, // Issuer must still hold this role at insert time
    pub expires_at: DateTime<Utc>,
}
