//! Common test helpers and utilities for server tests.

use std::sync::Arc;

use whereabouts_storage::{GroupId, JoinGroupParams, Role, UserId};
use whereabouts_store_sqlite::SqliteStore;

use crate::handlers::groups::{self, CreateGroupRequest};
use crate::handlers::locations::{self, ReportLocationRequest};
use crate::handlers::members::{self, UpdateRoleRequest};
use crate::handlers::users::{self, EnsureUserRequest};
use crate::request::{Principal, Request};
use crate::server::WhereaboutsServer;
use crate::view::LocationView;

/// Test helper: Create a WhereaboutsServer with in-memory SQLite
pub async fn create_test_server() -> WhereaboutsServer {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    WhereaboutsServer::new(store)
}

/// Test helper: Wrap a body in a request signed in as `user_id`
pub fn as_user<T>(user_id: &UserId, body: T) -> Request<T> {
    Request::new(body).with_principal(Principal {
        user_id: user_id.clone(),
    })
}

/// Test helper: Sign a new user in through the identity-provider path
pub async fn create_test_user(server: &WhereaboutsServer, name: &str) -> UserId {
    let user_id = UserId(uuid::Uuid::now_v7());
    users::sign_in(
        server,
        as_user(
            &user_id,
            EnsureUserRequest {
                name: Some(name.to_string()),
            },
        ),
    )
    .await
    .unwrap();
    user_id
}

/// Test helper: Create a group owned by `owner`
pub async fn create_test_group(server: &WhereaboutsServer, owner: &UserId, name: &str) -> GroupId {
    groups::create_group(
        server,
        as_user(
            owner,
            CreateGroupRequest {
                name: name.to_string(),
            },
        ),
    )
    .await
    .unwrap()
    .id
}

/// Test helper: Add a plain member directly through the store
pub async fn add_member(server: &WhereaboutsServer, group_id: &GroupId, user_id: &UserId) {
    server
        .store
        .join_group(&JoinGroupParams {
            group_id: group_id.clone(),
            user_id: user_id.clone(),
            is_location_shared: true,
        })
        .await
        .unwrap();
}

/// Test helper: Add a member and have `admin` promote them to `role`
pub async fn add_member_with_role(
    server: &WhereaboutsServer,
    group_id: &GroupId,
    admin: &UserId,
    user_id: &UserId,
    role: Role,
) {
    add_member(server, group_id, user_id).await;
    if role != Role::Member {
        members::update_member_role(
            server,
            as_user(
                admin,
                UpdateRoleRequest {
                    group_id: group_id.clone(),
                    member_id: user_id.clone(),
                    role: role.as_str().to_string(),
                },
            ),
        )
        .await
        .unwrap();
    }
}

/// Test helper: Issue a device API key for `user_id`
pub async fn device_key(server: &WhereaboutsServer, user_id: &UserId) -> String {
    users::regenerate_api_key(server, as_user(user_id, ()))
        .await
        .unwrap()
        .api_key
}

/// Test helper: Report a location with a device key
pub async fn report(
    server: &WhereaboutsServer,
    api_key: &str,
    world_id: Option<&str>,
    world_name: Option<&str>,
    instance_id: Option<&str>,
) -> LocationView {
    locations::report_location(
        server,
        Request::new(ReportLocationRequest {
            world_id: world_id.map(str::to_string),
            world_name: world_name.map(str::to_string),
            instance_id: instance_id.map(str::to_string),
            display_name: None,
        })
        .with_api_key(api_key),
    )
    .await
    .unwrap()
}

/// Test helper: Role of `user_id` in `group_id` as stored
pub async fn stored_role(server: &WhereaboutsServer, group_id: &GroupId, user_id: &UserId) -> Role {
    server
        .store
        .get_membership(group_id, user_id)
        .await
        .unwrap()
        .role
}
