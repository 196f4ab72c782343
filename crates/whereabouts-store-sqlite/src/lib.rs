use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;
use whereabouts_storage::{
    CreateGroupParams, CreateInviteParams, Group, GroupId, GroupRoster, Invite, InviteId,
    JoinGroupParams, Location, Member, Membership, MembershipSnapshot, RemoveMemberParams, Role,
    Store, StoreError, UpdateRoleParams, UpsertUserParams, User, UserId,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const USER_SELECT: &str = "SELECT u.id, u.name, u.display_name, u.api_key_hash, u.created_at, u.updated_at,
        l.world_id, l.world_name, l.instance_id, l.is_hidden, l.updated_at AS location_updated_at
     FROM users u LEFT JOIN locations l ON l.user_id = u.id";

const MEMBER_SELECT: &str = "SELECT m.group_id, m.user_id, m.role, m.is_location_shared,
        m.created_at AS membership_created_at, m.updated_at AS membership_updated_at,
        u.id, u.name, u.display_name, u.api_key_hash, u.created_at, u.updated_at,
        l.world_id, l.world_name, l.instance_id, l.is_hidden, l.updated_at AS location_updated_at
     FROM memberships m
     JOIN users u ON u.id = m.user_id
     LEFT JOIN locations l ON l.user_id = u.id";

const GROUP_COLUMNS: &str = "id, name, owner_user_id, invite_code, created_at, updated_at";

const MEMBERSHIP_COLUMNS: &str =
    "group_id, user_id, role, is_location_shared, created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `~/.whereabouts/store.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".whereabouts");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("store.db");
        let url = format!("sqlite://{}", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a separate database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn fetch_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE group_id = ? AND user_id = ?"
        );
        let row = sqlx::query_as::<_, MembershipRow>(&sql)
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or(StoreError::NotFound)?.into_membership()
    }

    async fn fetch_members(&self, group_ids: &[GroupId]) -> Result<Vec<Member>, StoreError> {
        if group_ids.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = vec!["?"; group_ids.len()].join(", ");
        let sql = format!("{MEMBER_SELECT} WHERE m.group_id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, MemberRow>(&sql);
        for id in group_ids {
            query = query.bind(id.0.to_string());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        rows.into_iter().map(MemberRow::into_member).collect()
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn upsert_user(&self, params: &UpsertUserParams) -> Result<User, StoreError> {
        let now = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO users(id, name, created_at, updated_at) VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = COALESCE(excluded.name, users.name),
                updated_at = excluded.updated_at",
        )
        .bind(params.id.0.to_string())
        .bind(params.name.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.get_user(&params.id).await
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.id = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or(StoreError::NotFound)?.into_user()
    }

    async fn get_user_by_api_key_hash(&self, hash: &str) -> Result<User, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.api_key_hash = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or(StoreError::NotFound)?.into_user()
    }

    async fn set_api_key_hash(&self, user_id: &UserId, hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET api_key_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(Utc::now().timestamp_millis())
            .bind(user_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_user_location(
        &self,
        user_id: &UserId,
        location: &Location,
        display_name: Option<String>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            "UPDATE users SET display_name = COALESCE(?, display_name), updated_at = ? WHERE id = ?",
        )
        .bind(display_name)
        .bind(Utc::now().timestamp_millis())
        .bind(user_id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        sqlx::query(
            "INSERT INTO locations(user_id, world_id, world_name, instance_id, is_hidden, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                world_id = excluded.world_id,
                world_name = excluded.world_name,
                instance_id = excluded.instance_id,
                is_hidden = excluded.is_hidden,
                updated_at = excluded.updated_at",
        )
        .bind(user_id.0.to_string())
        .bind(location.world_id.as_deref())
        .bind(location.world_name.as_deref())
        .bind(location.instance_id.as_deref())
        .bind(location.is_hidden)
        .bind(location.updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    // ───────────────────────────── Groups ─────────────────────────────

    async fn create_group(&self, params: &CreateGroupParams) -> Result<Group, StoreError> {
        let group_id = GroupId(Uuid::now_v7());
        let now = Utc::now().timestamp_millis();

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO sharing_groups(id, name, owner_user_id, invite_code, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)",
        )
        .bind(group_id.0.to_string())
        .bind(&params.name)
        .bind(params.owner_user_id.0.to_string())
        .bind(&params.invite_code)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        sqlx::query(
            "INSERT INTO memberships(group_id, user_id, role, is_location_shared, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)",
        )
        .bind(group_id.0.to_string())
        .bind(params.owner_user_id.0.to_string())
        .bind(Role::Admin.as_str())
        .bind(params.owner_location_shared)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(db_err)?;

        self.get_group(&group_id).await
    }

    async fn get_group(&self, group_id: &GroupId) -> Result<Group, StoreError> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM sharing_groups WHERE id = ?");
        let row = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(group_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or(StoreError::NotFound)?.into_group()
    }

    async fn get_group_by_invite_code(&self, code: &str) -> Result<Group, StoreError> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM sharing_groups WHERE invite_code = ?");
        let row = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or(StoreError::NotFound)?.into_group()
    }

    async fn get_group_roster(&self, group_id: &GroupId) -> Result<GroupRoster, StoreError> {
        let group = self.get_group(group_id).await?;
        let members = self.fetch_members(std::slice::from_ref(group_id)).await?;
        Ok(GroupRoster { group, members })
    }

    async fn list_user_rosters(&self, user_id: &UserId) -> Result<Vec<GroupRoster>, StoreError> {
        let sql = format!(
            "SELECT {GROUP_COLUMNS} FROM sharing_groups
             WHERE id IN (SELECT group_id FROM memberships WHERE user_id = ?)
             ORDER BY created_at DESC, id DESC"
        );
        let groups = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(user_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(GroupRow::into_group)
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<GroupId> = groups.iter().map(|g| g.id.clone()).collect();
        let mut by_group: HashMap<GroupId, Vec<Member>> = HashMap::new();
        for member in self.fetch_members(&ids).await? {
            by_group
                .entry(member.membership.group_id.clone())
                .or_default()
                .push(member);
        }

        Ok(groups
            .into_iter()
            .map(|group| {
                let members = by_group.remove(&group.id).unwrap_or_default();
                GroupRoster { group, members }
            })
            .collect())
    }

    async fn rename_group(
        &self,
        group_id: &GroupId,
        actor: &MembershipSnapshot,
        name: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE sharing_groups SET name = ?1, updated_at = ?2
             WHERE id = ?3
               AND EXISTS (SELECT 1 FROM memberships
                           WHERE group_id = ?3 AND user_id = ?4 AND role = ?5)",
        )
        .bind(name)
        .bind(Utc::now().timestamp_millis())
        .bind(group_id.0.to_string())
        .bind(actor.user_id.0.to_string())
        .bind(actor.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            // Distinguish a vanished group from a changed actor membership
            self.get_group(group_id).await?;
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn delete_group(
        &self,
        group_id: &GroupId,
        owner_user_id: &UserId,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let owner: Option<(String,)> =
            sqlx::query_as("SELECT owner_user_id FROM sharing_groups WHERE id = ?")
                .bind(group_id.0.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

        match owner {
            None => return Err(StoreError::NotFound),
            Some((owner,)) if owner != owner_user_id.0.to_string() => {
                return Err(StoreError::Conflict)
            }
            Some(_) => {}
        }

        for sql in [
            "DELETE FROM invites WHERE group_id = ?",
            "DELETE FROM memberships WHERE group_id = ?",
            "DELETE FROM sharing_groups WHERE id = ?",
        ] {
            sqlx::query(sql)
                .bind(group_id.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    // ───────────────────────────── Memberships ─────────────────────────────

    async fn get_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError> {
        self.fetch_membership(group_id, user_id).await
    }

    async fn join_group(&self, params: &JoinGroupParams) -> Result<(Membership, bool), StoreError> {
        let now = Utc::now().timestamp_millis();
        // The (group_id, user_id) primary key makes concurrent joins collapse into one row
        let result = sqlx::query(
            "INSERT INTO memberships(group_id, user_id, role, is_location_shared, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(group_id, user_id) DO NOTHING",
        )
        .bind(params.group_id.0.to_string())
        .bind(params.user_id.0.to_string())
        .bind(Role::Member.as_str())
        .bind(params.is_location_shared)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        let membership = self
            .fetch_membership(&params.group_id, &params.user_id)
            .await?;
        Ok((membership, result.rows_affected() == 1))
    }

    async fn update_membership_role(
        &self,
        params: &UpdateRoleParams,
    ) -> Result<Membership, StoreError> {
        let result = sqlx::query(
            "UPDATE memberships SET role = ?1, updated_at = ?2
             WHERE group_id = ?3 AND user_id = ?4 AND role = ?5
               AND EXISTS (SELECT 1 FROM memberships
                           WHERE group_id = ?3 AND user_id = ?6 AND role = ?7)
               AND (?1 = 'admin'
                    OR user_id <> (SELECT owner_user_id FROM sharing_groups WHERE id = ?3))",
        )
        .bind(params.new_role.as_str())
        .bind(Utc::now().timestamp_millis())
        .bind(params.group_id.0.to_string())
        .bind(params.target.user_id.0.to_string())
        .bind(params.target.role.as_str())
        .bind(params.actor.user_id.0.to_string())
        .bind(params.actor.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        self.fetch_membership(&params.group_id, &params.target.user_id)
            .await
    }

    async fn remove_membership(&self, params: &RemoveMemberParams) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM memberships
             WHERE group_id = ?1 AND user_id = ?2 AND role = ?3
               AND EXISTS (SELECT 1 FROM memberships
                           WHERE group_id = ?1 AND user_id = ?4 AND role = ?5)
               AND user_id <> (SELECT owner_user_id FROM sharing_groups WHERE id = ?1)",
        )
        .bind(params.group_id.0.to_string())
        .bind(params.target.user_id.0.to_string())
        .bind(params.target.role.as_str())
        .bind(params.actor.user_id.0.to_string())
        .bind(params.actor.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn set_location_shared(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        shared: bool,
    ) -> Result<Membership, StoreError> {
        let result = sqlx::query(
            "UPDATE memberships SET is_location_shared = ?, updated_at = ?
             WHERE group_id = ? AND user_id = ?",
        )
        .bind(shared)
        .bind(Utc::now().timestamp_millis())
        .bind(group_id.0.to_string())
        .bind(user_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.fetch_membership(group_id, user_id).await
    }

    async fn set_location_shared_for_user(
        &self,
        user_id: &UserId,
        shared: bool,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE memberships SET is_location_shared = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(shared)
        .bind(Utc::now().timestamp_millis())
        .bind(user_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    // ───────────────────────────── Invites ─────────────────────────────

    async fn create_invite(&self, params: &CreateInviteParams) -> Result<Invite, StoreError> {
        let invite_id = InviteId(Uuid::now_v7());
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO invites(id, group_id, token_hash, created_by_user_id, created_at, expires_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6
             WHERE EXISTS (SELECT 1 FROM memberships
                           WHERE group_id = ?2 AND user_id = ?4 AND role = ?7)",
        )
        .bind(invite_id.0.to_string())
        .bind(params.group_id.0.to_string())
        .bind(&params.token_hash)
        .bind(params.issuer.user_id.0.to_string())
        .bind(now.timestamp_millis())
        .bind(params.expires_at.timestamp_millis())
        .bind(params.issuer.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        self.get_invite_by_token_hash(&params.token_hash).await
    }

    async fn get_invite_by_token_hash(&self, hash: &str) -> Result<Invite, StoreError> {
        let row = sqlx::query_as::<_, InviteRow>(
            "SELECT id, group_id, token_hash, created_by_user_id, created_at, expires_at
             FROM invites WHERE token_hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.ok_or(StoreError::NotFound)?.into_invite()
    }
}

// ───────────────────────────── Rows ─────────────────────────────

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: Option<String>,
    display_name: Option<String>,
    api_key_hash: Option<String>,
    created_at: i64,
    updated_at: i64,
    world_id: Option<String>,
    world_name: Option<String>,
    instance_id: Option<String>,
    is_hidden: Option<bool>,
    location_updated_at: Option<i64>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        // A location row exists iff its timestamp came back from the LEFT JOIN
        let location = match self.location_updated_at {
            Some(updated_at) => Some(Location {
                world_id: self.world_id,
                world_name: self.world_name,
                instance_id: self.instance_id,
                is_hidden: self.is_hidden.unwrap_or(false),
                updated_at: timestamp(updated_at)?,
            }),
            None => None,
        };

        Ok(User {
            id: UserId(parse_uuid(&self.id)?),
            name: self.name,
            display_name: self.display_name,
            api_key_hash: self.api_key_hash,
            location,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: String,
    name: String,
    owner_user_id: String,
    invite_code: String,
    created_at: i64,
    updated_at: i64,
}

impl GroupRow {
    fn into_group(self) -> Result<Group, StoreError> {
        Ok(Group {
            id: GroupId(parse_uuid(&self.id)?),
            name: self.name,
            owner_user_id: UserId(parse_uuid(&self.owner_user_id)?),
            invite_code: self.invite_code,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    group_id: String,
    user_id: String,
    role: String,
    is_location_shared: bool,
    created_at: i64,
    updated_at: i64,
}

impl MembershipRow {
    fn into_membership(self) -> Result<Membership, StoreError> {
        Ok(Membership {
            group_id: GroupId(parse_uuid(&self.group_id)?),
            user_id: UserId(parse_uuid(&self.user_id)?),
            role: parse_role(&self.role)?,
            is_location_shared: self.is_location_shared,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    group_id: String,
    user_id: String,
    role: String,
    is_location_shared: bool,
    membership_created_at: i64,
    membership_updated_at: i64,
    #[sqlx(flatten)]
    user: UserRow,
}

impl MemberRow {
    fn into_member(self) -> Result<Member, StoreError> {
        let membership = MembershipRow {
            group_id: self.group_id,
            user_id: self.user_id,
            role: self.role,
            is_location_shared: self.is_location_shared,
            created_at: self.membership_created_at,
            updated_at: self.membership_updated_at,
        }
        .into_membership()?;

        Ok(Member {
            membership,
            user: self.user.into_user()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InviteRow {
    id: String,
    group_id: String,
    token_hash: String,
    created_by_user_id: String,
    created_at: i64,
    expires_at: i64,
}

impl InviteRow {
    fn into_invite(self) -> Result<Invite, StoreError> {
        Ok(Invite {
            id: InviteId(parse_uuid(&self.id)?),
            group_id: GroupId(parse_uuid(&self.group_id)?),
            token_hash: self.token_hash,
            created_by_user_id: UserId(parse_uuid(&self.created_by_user_id)?),
            created_at: timestamp(self.created_at)?,
            expires_at: timestamp(self.expires_at)?,
        })
    }
}

// ───────────────────────────── Helpers ─────────────────────────────

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map constraint violations on inserts to their store-level meaning.
fn classify(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::AlreadyExists;
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound;
        }
    }
    db_err(e)
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn parse_role(s: &str) -> Result<Role, StoreError> {
    s.parse::<Role>()
        .map_err(|e| StoreError::Backend(e.to_string()))
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Backend(format!("invalid timestamp: {millis}")))
}
