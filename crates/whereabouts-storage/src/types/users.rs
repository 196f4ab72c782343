//! User types.

use chrono::{DateTime, Utc};

use super::{Location, UserId};

/// Shown when a user has neither a display name nor a provider name.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// User record
#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,         // Name from the identity provider
    pub display_name: Option<String>, // Name last reported by the device client
    pub api_key_hash: Option<String>, // SHA-256 (hex) of the active device key
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name with fallback: reported name, provider name, then "Unknown".
    pub fn display_name(&self) -> &str {
        [self.display_name.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_DISPLAY_NAME)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key_hash.is_some()
    }
}

/// Parameters for creating (or refreshing) a user at identity-provider sign-in
#[derive(Clone, Debug)]
pub struct UpsertUserParams {
    pub id: UserId,
    pub name: Option<String>,
}
