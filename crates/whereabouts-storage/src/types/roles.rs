//! Role types for group membership.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Authorization level of a member within a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "co-admin")]
    CoAdmin,
    #[serde(rename = "member")]
    Member,
}

/// Error type for parsing Role from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl std::fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid role: {}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "co-admin" => Ok(Role::CoAdmin),
            "member" => Ok(Role::Member),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::CoAdmin => "co-admin",
            Role::Member => "member",
        }
    }

    /// Sort key for member lists: admins first, plain members last.
    pub fn priority(&self) -> u8 {
        match self {
            Role::Admin => 0,
            Role::CoAdmin => 1,
            Role::Member => 2,
        }
    }
}
