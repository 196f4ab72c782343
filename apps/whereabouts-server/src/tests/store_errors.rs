//! Store failures surface as `Internal`, never as a silent success.

use std::sync::Arc;

use chrono::{Duration, Utc};
use whereabouts_storage::{
    Group, GroupId, GroupRoster, Invite, InviteId, Member, Membership, MockStore, Role,
    StoreError, User, UserId,
};

use super::common::as_user;
use crate::error::ServiceError;
use crate::handlers::groups::{self, GroupRequest};
use crate::handlers::invites::{self, InviteTokenRequest};
use crate::handlers::locations::{self, ReportLocationRequest};
use crate::handlers::members::{self, RemoveMemberRequest, UpdateRoleRequest};
use crate::request::Request;
use crate::server::WhereaboutsServer;

fn server_with(store: MockStore) -> WhereaboutsServer {
    WhereaboutsServer::new(Arc::new(store))
}

fn member(group_id: &GroupId, user_id: &UserId, role: Role) -> Member {
    let now = Utc::now();
    Member {
        membership: Membership {
            group_id: group_id.clone(),
            user_id: user_id.clone(),
            role,
            is_location_shared: true,
            created_at: now,
            updated_at: now,
        },
        user: User {
            id: user_id.clone(),
            name: None,
            display_name: None,
            api_key_hash: None,
            location: None,
            created_at: now,
            updated_at: now,
        },
    }
}

/// Owner `admin` plus a plain member, as the store would return it.
fn roster(admin: &UserId, plain: &UserId) -> GroupRoster {
    let group_id = GroupId(uuid::Uuid::now_v7());
    let now = Utc::now();
    GroupRoster {
        members: vec![
            member(&group_id, admin, Role::Admin),
            member(&group_id, plain, Role::Member),
        ],
        group: Group {
            id: group_id,
            name: "G".to_string(),
            owner_user_id: admin.clone(),
            invite_code: "ABCDEF012345".to_string(),
            created_at: now,
            updated_at: now,
        },
    }
}

#[tokio::test]
async fn backend_failure_on_read_is_internal() {
    let mut store = MockStore::new();
    store
        .expect_get_group_roster()
        .returning(|_| Err(StoreError::Backend("disk I/O error".into())));
    let server = server_with(store);

    let err = groups::get_group(
        &server,
        as_user(
            &UserId(uuid::Uuid::now_v7()),
            GroupRequest {
                group_id: GroupId(uuid::Uuid::now_v7()),
            },
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Internal(ref m) if m.contains("disk I/O error")));
}

#[tokio::test]
async fn backend_failure_on_api_key_lookup_is_internal() {
    let mut store = MockStore::new();
    store
        .expect_get_user_by_api_key_hash()
        .returning(|_| Err(StoreError::Backend("locked".into())));
    let server = server_with(store);

    let err = locations::report_location(
        &server,
        Request::new(ReportLocationRequest::default()).with_api_key("key"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Internal(_)));
}

#[tokio::test]
async fn expired_invite_never_reaches_join() {
    let mut store = MockStore::new();
    store.expect_get_invite_by_token_hash().returning(|hash| {
        Ok(Invite {
            id: InviteId(uuid::Uuid::now_v7()),
            group_id: GroupId(uuid::Uuid::now_v7()),
            token_hash: hash.to_string(),
            created_by_user_id: UserId(uuid::Uuid::now_v7()),
            created_at: Utc::now() - Duration::hours(25),
            expires_at: Utc::now() - Duration::hours(1),
        })
    });
    // No group lookup or join expected
    store.expect_get_group().never();
    store.expect_join_group().never();
    let server = server_with(store);

    let err = invites::join_by_token(
        &server,
        as_user(
            &UserId(uuid::Uuid::now_v7()),
            InviteTokenRequest {
                token: "t".repeat(64),
            },
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn list_failure_is_internal() {
    let mut store = MockStore::new();
    store
        .expect_list_user_rosters()
        .returning(|_| Err(StoreError::Backend("timeout".into())));
    let server = server_with(store);

    let err = groups::list_groups(&server, as_user(&UserId(uuid::Uuid::now_v7()), ()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "internal");
}

#[tokio::test]
async fn lost_race_on_role_change_is_conflict() {
    let admin = UserId(uuid::Uuid::now_v7());
    let plain = UserId(uuid::Uuid::now_v7());
    let snapshot = roster(&admin, &plain);
    let group_id = snapshot.group.id.clone();

    let mut store = MockStore::new();
    store
        .expect_get_group_roster()
        .returning(move |_| Ok(snapshot.clone()));
    store
        .expect_update_membership_role()
        .times(1)
        .returning(|_| Err(StoreError::Conflict));
    let server = server_with(store);

    let err = members::update_member_role(
        &server,
        as_user(
            &admin,
            UpdateRoleRequest {
                group_id,
                member_id: plain,
                role: "co-admin".to_string(),
            },
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn lost_race_on_removal_is_conflict() {
    let admin = UserId(uuid::Uuid::now_v7());
    let plain = UserId(uuid::Uuid::now_v7());
    let snapshot = roster(&admin, &plain);
    let group_id = snapshot.group.id.clone();

    let mut store = MockStore::new();
    store
        .expect_get_group_roster()
        .returning(move |_| Ok(snapshot.clone()));
    store
        .expect_remove_membership()
        .times(1)
        .returning(|_| Err(StoreError::Conflict));
    let server = server_with(store);

    let err = members::remove_member(
        &server,
        as_user(
            &admin,
            RemoveMemberRequest {
                group_id,
                member_id: plain,
            },
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn denied_change_never_reaches_the_store() {
    let admin = UserId(uuid::Uuid::now_v7());
    let plain = UserId(uuid::Uuid::now_v7());
    let snapshot = roster(&admin, &plain);
    let group_id = snapshot.group.id.clone();

    let mut store = MockStore::new();
    store
        .expect_get_group_roster()
        .returning(move |_| Ok(snapshot.clone()));
    store.expect_update_membership_role().never();
    let server = server_with(store);

    let err = members::update_member_role(
        &server,
        as_user(
            &plain,
            UpdateRoleRequest {
                group_id,
                member_id: plain.clone(),
                role: "admin".to_string(),
            },
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}
