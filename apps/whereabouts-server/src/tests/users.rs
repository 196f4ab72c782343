use whereabouts_storage::UserId;

use super::common::*;
use crate::error::ServiceError;
use crate::handlers::users::{self, EnsureUserRequest};
use crate::request::Request;
use crate::server::hash_secret;

#[tokio::test]
async fn sign_in_creates_then_refreshes_user() {
    let server = create_test_server().await;
    let user_id = UserId(uuid::Uuid::now_v7());

    let profile = users::sign_in(
        &server,
        as_user(
            &user_id,
            EnsureUserRequest {
                name: Some("  alice ".to_string()),
            },
        ),
    )
    .await
    .unwrap();
    assert_eq!(profile.id, user_id);
    assert_eq!(profile.display_name, "alice");
    assert!(!profile.has_api_key);
    assert!(profile.location.is_none());

    // A second sign-in without a name keeps the stored one
    let again = users::sign_in(&server, as_user(&user_id, EnsureUserRequest { name: None }))
        .await
        .unwrap();
    assert_eq!(again.display_name, "alice");
}

#[tokio::test]
async fn sign_in_requires_principal() {
    let server = create_test_server().await;
    let err = users::sign_in(&server, Request::new(EnsureUserRequest::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn profile_of_unknown_user_is_not_found() {
    let server = create_test_server().await;
    let err = users::profile(&server, as_user(&UserId(uuid::Uuid::now_v7()), ()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn regenerate_api_key_replaces_previous_key() {
    let server = create_test_server().await;
    let alice = create_test_user(&server, "alice").await;

    let first = device_key(&server, &alice).await;
    let second = device_key(&server, &alice).await;
    assert_eq!(first.len(), 64);
    assert_ne!(first, second);

    // Only the hash is stored
    let user = server.store.get_user(&alice).await.unwrap();
    assert_eq!(user.api_key_hash.as_deref(), Some(hash_secret(&second).as_str()));

    let old = server.authenticate_api_key(Some(&first)).await.unwrap_err();
    assert!(matches!(old, ServiceError::Unauthorized(_)));
    assert_eq!(
        server.authenticate_api_key(Some(&second)).await.unwrap().id,
        alice
    );

    let profile = users::profile(&server, as_user(&alice, ())).await.unwrap();
    assert!(profile.has_api_key);
}

#[tokio::test]
async fn regenerate_api_key_for_unknown_user_is_not_found() {
    let server = create_test_server().await;
    let err = users::regenerate_api_key(&server, as_user(&UserId(uuid::Uuid::now_v7()), ()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
