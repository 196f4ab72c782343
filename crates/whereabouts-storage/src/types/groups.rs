//! Group and membership types.

use chrono::{DateTime, Utc};

use super::{GroupId, Role, User, UserId};

/// Group record
#[derive(Clone, Debug)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub owner_user_id: UserId, // Never changes; not a role
    pub invite_code: String,   // Static join code, distinct from expiring invite tokens
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Group membership record, unique on (group_id, user_id)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub role: Role,
    pub is_location_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A membership joined with its user (and the user's location).
#[derive(Clone, Debug)]
pub struct Member {
    pub membership: Membership,
    pub user: User,
}

/// A group with all of its members loaded.
#[derive(Clone, Debug)]
pub struct GroupRoster {
    pub group: Group,
    pub members: Vec<Member>,
}

impl GroupRoster {
    pub fn member(&self, user_id: &UserId) -> Option<&Member> {
        self.members.iter().find(|m| &m.membership.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.member(user_id).is_some()
    }

    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.member(user_id)
            .is_some_and(|m| m.membership.role == Role::Admin)
    }
}

/// Parameters for creating a group together with the creator's admin membership
#[derive(Clone, Debug)]
pub struct CreateGroupParams {
    pub name: String,
    pub owner_user_id: UserId,
    pub invite_code: String,
    pub owner_location_shared: bool,
}

/// Parameters for joining a group as a plain member
#[derive(Clone, Debug)]
pub struct JoinGroupParams {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub is_location_shared: bool, // Only applied when the membership is created
}

/// The membership state an authorization decision was made on.
///
/// Guarded writes only apply while every snapshot still matches the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub user_id: UserId,
    pub role: Role,
}

/// Parameters for a guarded role change
#[derive(Clone, Debug)]
pub struct UpdateRoleParams {
    pub group_id: GroupId,
    pub actor: MembershipSnapshot,
    pub target: MembershipSnapshot,
    pub new_role: Role,
}

/// Parameters for a guarded membership removal
#[derive(Clone, Debug)]
pub struct RemoveMemberParams {
    pub group_id: GroupId,
    pub actor: MembershipSnapshot,
    pub target: MembershipSnapshot,
}
