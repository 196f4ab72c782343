//! Authorization rules for every mutating group operation.
//!
//! All functions are pure: they take the acting member, the target member and
//! the group owner explicitly and never touch the store. Anything not
//! explicitly allowed is denied.
//!
//! Role management matrix (`actor` acting on a different `target`):
//!
//! | actor    | target    | requested | decision |
//! |----------|-----------|-----------|----------|
//! | admin    | owner     | != admin  | deny     |
//! | admin    | any       | any       | allow    |
//! | co-admin | admin     | any       | deny     |
//! | co-admin | non-admin | admin     | deny     |
//! | co-admin | non-admin | non-admin | allow    |
//! | member   | any       | any       | deny     |

use std::fmt;

use whereabouts_storage::{Member, MembershipSnapshot, Role, UserId};

use crate::error::ServiceError;

/// The member attempting an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

/// The member an operation is aimed at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn of(member: &Member) -> Self {
        Self {
            user_id: member.membership.user_id.clone(),
            role: member.membership.role,
        }
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            user_id: self.user_id.clone(),
            role: self.role,
        }
    }
}

impl Target {
    pub fn of(member: &Member) -> Self {
        Self {
            user_id: member.membership.user_id.clone(),
            role: member.membership.role,
        }
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            user_id: self.user_id.clone(),
            role: self.role,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    SelfRoleChange,
    OwnerDemotion,
    OwnerRemoval,
    AdminTarget,
    AdminGrant,
    NonMemberTarget,
    AdminRequired,
    OwnerRequired,
    InsufficientRole,
}

impl DenyReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::SelfRoleChange => "cannot change your own role",
            DenyReason::OwnerDemotion => "the group owner cannot be demoted",
            DenyReason::OwnerRemoval => "the group owner cannot be removed",
            DenyReason::AdminTarget => "co-admins cannot manage admins",
            DenyReason::AdminGrant => "only admins can grant the admin role",
            DenyReason::NonMemberTarget => "co-admins can only remove plain members",
            DenyReason::AdminRequired => "admin role required",
            DenyReason::OwnerRequired => "only the group owner can do this",
            DenyReason::InsufficientRole => "insufficient role",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// `Forbidden` carrying the deny reason.
    pub fn into_result(self) -> Result<(), ServiceError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(ServiceError::forbidden(reason.message())),
        }
    }
}

pub fn can_manage_role(
    actor: &Actor,
    target: &Target,
    requested: Role,
    group_owner: &UserId,
) -> Decision {
    if actor.user_id == target.user_id {
        return Decision::Deny(DenyReason::SelfRoleChange);
    }
    let target_is_owner = &target.user_id == group_owner;

    match actor.role {
        Role::Admin => {
            if target_is_owner && requested != Role::Admin {
                Decision::Deny(DenyReason::OwnerDemotion)
            } else {
                Decision::Allow
            }
        }
        Role::CoAdmin => {
            if target.role == Role::Admin || target_is_owner {
                Decision::Deny(DenyReason::AdminTarget)
            } else if requested == Role::Admin {
                Decision::Deny(DenyReason::AdminGrant)
            } else {
                Decision::Allow
            }
        }
        Role::Member => Decision::Deny(DenyReason::InsufficientRole),
    }
}

/// Covers both removal by a manager and self-leave (`actor == target`).
pub fn can_remove_member(actor: &Actor, target: &Target, group_owner: &UserId) -> Decision {
    if &target.user_id == group_owner {
        return Decision::Deny(DenyReason::OwnerRemoval);
    }
    if actor.user_id == target.user_id {
        return Decision::Allow;
    }

    match actor.role {
        Role::Admin => Decision::Allow,
        Role::CoAdmin if target.role == Role::Member => Decision::Allow,
        Role::CoAdmin => Decision::Deny(DenyReason::NonMemberTarget),
        Role::Member => Decision::Deny(DenyReason::InsufficientRole),
    }
}

pub fn can_rename(actor: &Actor) -> Decision {
    match actor.role {
        Role::Admin => Decision::Allow,
        Role::CoAdmin | Role::Member => Decision::Deny(DenyReason::AdminRequired),
    }
}

/// Deletion is owner-only; other admins are refused.
pub fn can_delete_group(actor_user_id: &UserId, group_owner: &UserId) -> Decision {
    if actor_user_id == group_owner {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::OwnerRequired)
    }
}

pub fn can_issue_invite(actor: &Actor) -> Decision {
    match actor.role {
        Role::Admin => Decision::Allow,
        Role::CoAdmin | Role::Member => Decision::Deny(DenyReason::AdminRequired),
    }
}
