//! Location types and the canonicalization of client-reported locations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// World id a client sends when the user is in a private instance.
pub const PRIVATE_WORLD_ID: &str = "private";

/// World id a client may send to clear the location (matched case-insensitively).
pub const OFFLINE_WORLD_ID: &str = "offline";

/// A user's current whereabouts in the tracked platform.
///
/// `world_id == None` means offline; in that case `world_name` and
/// `instance_id` are `None` as well. `is_hidden` is set iff the reported
/// world id was the [`PRIVATE_WORLD_ID`] sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub world_id: Option<String>,
    pub world_name: Option<String>,
    pub instance_id: Option<String>,
    pub is_hidden: bool,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    pub fn is_offline(&self) -> bool {
        self.world_id.is_none()
    }
}

/// Raw location as reported by a device client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationReport {
    pub world_id: Option<String>,
    pub world_name: Option<String>,
    pub instance_id: Option<String>,
}

impl LocationReport {
    /// Canonicalize the report into a stored [`Location`] stamped with `now`.
    pub fn normalize(&self, now: DateTime<Utc>) -> Location {
        let world_id = non_empty(self.world_id.as_deref());
        let clearing = match world_id {
            None => true,
            Some(id) => id.eq_ignore_ascii_case(OFFLINE_WORLD_ID),
        };

        if clearing {
            return Location {
                world_id: None,
                world_name: None,
                instance_id: None,
                is_hidden: false,
                updated_at: now,
            };
        }

        Location {
            is_hidden: world_id == Some(PRIVATE_WORLD_ID),
            world_id: world_id.map(str::to_string),
            world_name: non_empty(self.world_name.as_deref()).map(str::to_string),
            instance_id: non_empty(self.instance_id.as_deref()).map(str::to_string),
            updated_at: now,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
