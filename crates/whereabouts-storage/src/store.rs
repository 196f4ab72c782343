//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait the server depends on.
///
/// Guarded mutations take the [`MembershipSnapshot`]s their authorization
/// decision was based on and return [`StoreError::Conflict`] without writing
/// anything if the stored memberships no longer match.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create the user on first sign-in, or refresh the provider name.
    async fn upsert_user(&self, params: &UpsertUserParams) -> Result<User, StoreError>;

    /// Get user by ID (with location, if any).
    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError>;

    /// Resolve a device credential (by its hash) to its user.
    async fn get_user_by_api_key_hash(&self, hash: &str) -> Result<User, StoreError>;

    /// Replace the user's device credential; the previous one stops resolving.
    async fn set_api_key_hash(&self, user_id: &UserId, hash: &str) -> Result<(), StoreError>;

    /// Upsert the user's location and, if given, the reported display name.
    async fn update_user_location(
        &self,
        user_id: &UserId,
        location: &Location,
        display_name: Option<String>,
    ) -> Result<(), StoreError>;

    // ───────────────────────────────────── Groups ─────────────────────────────────────────

    /// Create a group and its owner's admin membership atomically.
    async fn create_group(&self, params: &CreateGroupParams) -> Result<Group, StoreError>;

    /// Get group by ID.
    async fn get_group(&self, group_id: &GroupId) -> Result<Group, StoreError>;

    /// Get group by its static invite code.
    async fn get_group_by_invite_code(&self, code: &str) -> Result<Group, StoreError>;

    /// Get a group with every membership, user and location.
    async fn get_group_roster(&self, group_id: &GroupId) -> Result<GroupRoster, StoreError>;

    /// List rosters of all groups the user belongs to, newest group first.
    async fn list_user_rosters(&self, user_id: &UserId) -> Result<Vec<GroupRoster>, StoreError>;

    /// Rename a group (guarded by the actor's membership).
    async fn rename_group(
        &self,
        group_id: &GroupId,
        actor: &MembershipSnapshot,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Delete a group with all its memberships and invites in one transaction.
    /// Nothing is deleted unless `owner_user_id` owns the group.
    async fn delete_group(
        &self,
        group_id: &GroupId,
        owner_user_id: &UserId,
    ) -> Result<(), StoreError>;

    // ───────────────────────────────────── Memberships ────────────────────────────────────

    /// Get a single membership.
    async fn get_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError>;

    /// Insert a member membership, or return the existing one untouched.
    /// The flag is true when the membership was created by this call.
    async fn join_group(&self, params: &JoinGroupParams) -> Result<(Membership, bool), StoreError>;

    /// Change a member's role (guarded by actor and target snapshots).
    async fn update_membership_role(
        &self,
        params: &UpdateRoleParams,
    ) -> Result<Membership, StoreError>;

    /// Delete a membership (guarded by actor and target snapshots).
    async fn remove_membership(&self, params: &RemoveMemberParams) -> Result<(), StoreError>;

    /// Set the per-group sharing flag on one membership.
    async fn set_location_shared(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        shared: bool,
    ) -> Result<Membership, StoreError>;

    /// Set the sharing flag on every membership of a user.
    /// Returns the number of memberships updated.
    async fn set_location_shared_for_user(
        &self,
        user_id: &UserId,
        shared: bool,
    ) -> Result<u64, StoreError>;

    // ───────────────────────────────────── Invites ────────────────────────────────────────

    /// Create an invite token (guarded by the issuer's membership).
    async fn create_invite(&self, params: &CreateInviteParams) -> Result<Invite, StoreError>;

    /// Get invite by token hash. Expiry is not checked here.
    async fn get_invite_by_token_hash(&self, hash: &str) -> Result<Invite, StoreError>;
}
