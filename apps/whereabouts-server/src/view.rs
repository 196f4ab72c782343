//! Per-viewer projection of group rosters.
//!
//! Nothing leaves the server about another member's location unless that
//! member shares it with the group. Hidden locations never expose an
//! instance, not even to the member themselves.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use whereabouts_storage::{Group, GroupId, GroupRoster, Location, Member, Role, UserId};

pub const OFFLINE_LABEL: &str = "Offline";
pub const PRIVATE_LABEL: &str = "Private";
pub const UNKNOWN_WORLD_LABEL: &str = "Unknown World";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationView {
    pub world_id: Option<String>,
    pub world_name: String,
    pub instance_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub is_online: bool,
    pub is_hidden: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub user_id: UserId,
    pub name: String,
    pub role: Role,
    pub is_location_shared: bool,
    pub location: Option<LocationView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: GroupId,
    pub name: String,
    pub owner_user_id: UserId,
    pub viewer_role: Role,
    /// Only admins see the static join code.
    pub invite_code: Option<String>,
    pub members: Vec<MemberView>,
}

/// Minimal group identity shown to prospective members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPreview {
    pub id: GroupId,
    pub name: String,
}

impl From<&Group> for GroupPreview {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id.clone(),
            name: group.name.clone(),
        }
    }
}

/// Dashboard entry for one of the viewer's groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: GroupId,
    pub name: String,
    pub role: Role,
    pub member_count: usize,
    pub active_members: Vec<MemberView>,
}

/// Render a stored location for a viewer.
///
/// `should_show` is false when the owner of the location does not share it
/// with this viewer.
pub fn location_view(location: Option<&Location>, should_show: bool) -> Option<LocationView> {
    let location = location?;

    if !should_show || location.is_offline() {
        return Some(LocationView {
            world_id: None,
            world_name: OFFLINE_LABEL.to_string(),
            instance_id: None,
            updated_at: location.updated_at,
            is_online: false,
            is_hidden: false,
        });
    }

    if location.is_hidden {
        return Some(LocationView {
            world_id: location.world_id.clone(),
            world_name: PRIVATE_LABEL.to_string(),
            instance_id: None,
            updated_at: location.updated_at,
            is_online: true,
            is_hidden: true,
        });
    }

    Some(LocationView {
        world_id: location.world_id.clone(),
        world_name: location
            .world_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_WORLD_LABEL.to_string()),
        instance_id: location.instance_id.clone(),
        updated_at: location.updated_at,
        is_online: true,
        is_hidden: false,
    })
}

pub fn project_member(member: &Member, viewer: &UserId) -> MemberView {
    let is_own = &member.membership.user_id == viewer;
    let should_show = is_own || member.membership.is_location_shared;

    MemberView {
        user_id: member.membership.user_id.clone(),
        name: member.user.display_name().to_string(),
        role: member.membership.role,
        is_location_shared: member.membership.is_location_shared,
        location: location_view(member.user.location.as_ref(), should_show),
    }
}

/// Project a roster for `viewer`. `None` when the viewer is not a member.
pub fn project_group(roster: &GroupRoster, viewer: &UserId) -> Option<GroupView> {
    let viewer_role = roster.member(viewer)?.membership.role;

    let mut members: Vec<MemberView> = roster
        .members
        .iter()
        .map(|m| project_member(m, viewer))
        .collect();
    sort_members(&mut members);

    Some(GroupView {
        id: roster.group.id.clone(),
        name: roster.group.name.clone(),
        owner_user_id: roster.group.owner_user_id.clone(),
        viewer_role,
        invite_code: (viewer_role == Role::Admin).then(|| roster.group.invite_code.clone()),
        members,
    })
}

pub fn summarize(roster: &GroupRoster, viewer: &UserId) -> Option<GroupSummary> {
    let view = project_group(roster, viewer)?;
    let member_count = view.members.len();
    let active_members = view
        .members
        .into_iter()
        .filter(|m| {
            m.location
                .as_ref()
                .is_some_and(|l| l.is_online && !l.is_hidden)
        })
        .collect();

    Some(GroupSummary {
        id: view.id,
        name: view.name,
        role: view.viewer_role,
        member_count,
        active_members,
    })
}

/// Role priority first, then display name.
pub fn sort_members(members: &mut [MemberView]) {
    members.sort_by(|a, b| {
        a.role
            .priority()
            .cmp(&b.role.priority())
            .then_with(|| compare_names(&a.name, &b.name))
    });
}

/// Root-locale style collation: base letters first, then accents, then
/// lowercase before uppercase.
fn compare_names(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(&base_letters(b))
        .then_with(|| with_accents(a).cmp(&with_accents(b)))
        .then_with(|| b.nfd().cmp(a.nfd()))
}

fn base_letters(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn with_accents(name: &str) -> String {
    name.nfd().flat_map(char::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;
    use whereabouts_storage::{Membership, User};

    fn online(world_id: &str, name: Option<&str>, instance: Option<&str>) -> Location {
        Location {
            world_id: Some(world_id.to_string()),
            world_name: name.map(str::to_string),
            instance_id: instance.map(str::to_string),
            is_hidden: world_id == "private",
            updated_at: Utc::now(),
        }
    }

    fn offline() -> Location {
        Location {
            world_id: None,
            world_name: None,
            instance_id: None,
            is_hidden: false,
            updated_at: Utc::now() - Duration::minutes(5),
        }
    }

    fn member(
        group_id: &GroupId,
        name: &str,
        role: Role,
        shared: bool,
        location: Option<Location>,
    ) -> Member {
        let user_id = UserId(Uuid::new_v4());
        Member {
            membership: Membership {
                group_id: group_id.clone(),
                user_id: user_id.clone(),
                role,
                is_location_shared: shared,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            user: User {
                id: user_id,
                name: Some(name.to_string()),
                display_name: None,
                api_key_hash: None,
                location,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    fn roster(members: Vec<Member>) -> GroupRoster {
        let group_id = members[0].membership.group_id.clone();
        GroupRoster {
            group: Group {
                id: group_id,
                name: "G".to_string(),
                owner_user_id: members[0].membership.user_id.clone(),
                invite_code: "CODE".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            members,
        }
    }

    #[test]
    fn test_unshared_location_renders_offline() {
        let gid = GroupId(Uuid::new_v4());
        let m = member(
            &gid,
            "bob",
            Role::Member,
            false,
            Some(online("wrld_1", Some("Lobby"), Some("i1"))),
        );
        let view = project_member(&m, &UserId(Uuid::new_v4())).location.unwrap();
        assert!(!view.is_online);
        assert_eq!(view.world_name, OFFLINE_LABEL);
        assert!(view.world_id.is_none());
        assert!(view.instance_id.is_none());
    }

    #[test]
    fn test_own_location_always_shown() {
        let gid = GroupId(Uuid::new_v4());
        let m = member(
            &gid,
            "bob",
            Role::Member,
            false,
            Some(online("wrld_1", Some("Lobby"), Some("i1"))),
        );
        let view = project_member(&m, &m.membership.user_id).location.unwrap();
        assert!(view.is_online);
        assert_eq!(view.world_name, "Lobby");
        assert_eq!(view.instance_id.as_deref(), Some("i1"));
    }

    #[test]
    fn test_hidden_shared_location_shows_world_only() {
        let gid = GroupId(Uuid::new_v4());
        let m = member(
            &gid,
            "bob",
            Role::Member,
            true,
            Some(online("private", Some("Secret Room"), Some("i9"))),
        );
        let view = project_member(&m, &UserId(Uuid::new_v4())).location.unwrap();
        assert!(view.is_online);
        assert!(view.is_hidden);
        assert_eq!(view.world_name, PRIVATE_LABEL);
        assert!(view.world_id.is_some());
        assert!(view.instance_id.is_none());

        // The owner of a hidden location gets the same world-level view
        let own = project_member(&m, &m.membership.user_id).location.unwrap();
        assert!(own.instance_id.is_none());
    }

    #[test]
    fn test_offline_and_missing_locations() {
        let gid = GroupId(Uuid::new_v4());
        let viewer = UserId(Uuid::new_v4());

        let m = member(&gid, "bob", Role::Member, true, Some(offline()));
        let view = project_member(&m, &viewer).location.unwrap();
        assert!(!view.is_online);
        assert_eq!(view.world_name, OFFLINE_LABEL);
        assert_eq!(view.updated_at, m.user.location.as_ref().unwrap().updated_at);

        let never = member(&gid, "carol", Role::Member, true, None);
        assert!(project_member(&never, &viewer).location.is_none());
    }

    #[test]
    fn test_unknown_world_label() {
        let gid = GroupId(Uuid::new_v4());
        let m = member(&gid, "bob", Role::Member, true, Some(online("wrld_2", None, None)));
        let view = project_member(&m, &UserId(Uuid::new_v4())).location.unwrap();
        assert_eq!(view.world_name, UNKNOWN_WORLD_LABEL);
    }

    #[test]
    fn test_sort_by_role_then_name() {
        let gid = GroupId(Uuid::new_v4());
        let r = roster(vec![
            member(&gid, "zed", Role::Admin, true, None),
            member(&gid, "Bob", Role::Member, true, None),
            member(&gid, "alice", Role::Member, true, None),
            member(&gid, "bob", Role::Member, true, None),
            member(&gid, "Yvonne", Role::CoAdmin, true, None),
        ]);
        let viewer = r.members[0].membership.user_id.clone();
        let names: Vec<_> = project_group(&r, &viewer)
            .unwrap()
            .members
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["zed", "Yvonne", "alice", "bob", "Bob"]);
    }

    #[test]
    fn test_accented_names_sort_with_their_base_letter() {
        let names = |input: &[&str]| {
            let gid = GroupId(Uuid::new_v4());
            let mut members: Vec<_> = input
                .iter()
                .map(|n| member(&gid, n, Role::Member, true, None))
                .map(|m| project_member(&m, &UserId(Uuid::new_v4())))
                .collect();
            sort_members(&mut members);
            members.into_iter().map(|m| m.name).collect::<Vec<_>>()
        };

        assert_eq!(names(&["Zoe", "Émile", "edgar"]), vec!["edgar", "Émile", "Zoe"]);
        assert_eq!(names(&["Émile", "emile", "émile"]), vec!["emile", "émile", "Émile"]);
        // Precomposed and decomposed forms collate identically
        assert_eq!(compare_names("\u{e9}mile", "e\u{301}mile"), Ordering::Equal);
        assert_eq!(names(&["Östen", "Oscar", "Zlatan"]), vec!["Oscar", "Östen", "Zlatan"]);
    }

    #[test]
    fn test_non_member_gets_no_projection() {
        let gid = GroupId(Uuid::new_v4());
        let r = roster(vec![member(&gid, "owner", Role::Admin, true, None)]);
        assert!(project_group(&r, &UserId(Uuid::new_v4())).is_none());
        assert!(summarize(&r, &UserId(Uuid::new_v4())).is_none());
    }

    #[test]
    fn test_invite_code_only_for_admins() {
        let gid = GroupId(Uuid::new_v4());
        let r = roster(vec![
            member(&gid, "owner", Role::Admin, true, None),
            member(&gid, "co", Role::CoAdmin, true, None),
        ]);
        let owner = r.members[0].membership.user_id.clone();
        let co = r.members[1].membership.user_id.clone();
        assert_eq!(
            project_group(&r, &owner).unwrap().invite_code.as_deref(),
            Some("CODE")
        );
        let co_view = project_group(&r, &co).unwrap();
        assert!(co_view.invite_code.is_none());
        assert_eq!(co_view.viewer_role, Role::CoAdmin);
    }

    #[test]
    fn test_summary_active_members() {
        let gid = GroupId(Uuid::new_v4());
        let r = roster(vec![
            member(&gid, "owner", Role::Admin, true, Some(online("wrld_1", Some("A"), None))),
            member(&gid, "hidden", Role::Member, true, Some(online("private", None, None))),
            member(&gid, "quiet", Role::Member, false, Some(online("wrld_1", Some("A"), None))),
            member(&gid, "away", Role::Member, true, Some(offline())),
        ]);
        let viewer = r.members[0].membership.user_id.clone();
        let summary = summarize(&r, &viewer).unwrap();
        assert_eq!(summary.member_count, 4);
        assert_eq!(summary.role, Role::Admin);
        let active: Vec<_> = summary.active_members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(active, vec!["owner"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let gid = GroupId(Uuid::new_v4());
        let location = online("wrld_1", Some("A"), Some("i1"));
        let m = member(&gid, "bob", Role::CoAdmin, true, Some(location));
        let json = serde_json::to_value(project_member(&m, &UserId(Uuid::new_v4()))).unwrap();
        assert_eq!(json["role"], "co-admin");
        assert_eq!(json["isLocationShared"], true);
        assert_eq!(json["location"]["worldName"], "A");
        assert_eq!(json["location"]["isOnline"], true);
    }
}
