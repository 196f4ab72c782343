//! Request envelope carrying the caller's identity alongside the body.
//!
//! Two independent identity channels exist: the identity provider's
//! [`Principal`] and the per-user device API key. Handlers read exactly one
//! of them.

use serde::{Deserialize, Serialize};
use whereabouts_storage::UserId;

use crate::error::ServiceError;

/// The authenticated user as vouched for by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
}

#[derive(Clone, Debug)]
pub struct Request<T> {
    principal: Option<Principal>,
    api_key: Option<String>,
    body: T,
}

impl<T> Request<T> {
    pub fn new(body: T) -> Self {
        Self {
            principal: None,
            api_key: None,
            body,
        }
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn into_inner(self) -> T {
        self.body
    }
}

/// The principal, or `Unauthorized` when the identity provider yielded none.
pub fn require_principal<T>(request: &Request<T>) -> Result<Principal, ServiceError> {
    request
        .principal()
        .cloned()
        .ok_or_else(|| ServiceError::unauthorized("sign-in required"))
}
