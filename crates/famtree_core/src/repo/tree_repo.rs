//! Tree store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist tree documents: metadata, owner, and the member id list.
//! - Provide the conditional owner swap used by guest claims.
//!
//! # Invariants
//! - Owner columns are exclusive; the schema rejects rows holding both a
//!   user and a guest token, or neither.
//! - `members` is updated one document at a time with set semantics.

use super::support::{
    begin_document_update, decode_json, encode_json, ensure_store_ready, parse_optional_uuid,
    parse_uuid,
};
use super::{StoreError, StoreResult};
use crate::model::member::MemberId;
use crate::model::now_epoch_ms;
use crate::model::tree::{Privacy, Tree, TreeId, TreeOwner};
use crate::model::user::UserId;
use rusqlite::{params, Connection, Row};

const TREE_TABLE: &str = "trees";

const TREE_COLUMNS: &[&str] = &[
    "tree_uuid",
    "name",
    "description",
    "privacy",
    "shareable_link",
    "owner_uuid",
    "guest_session_id",
    "members",
    "created_at",
    "updated_at",
];

const TREE_SELECT_SQL: &str = "SELECT
    tree_uuid,
    name,
    description,
    privacy,
    shareable_link,
    owner_uuid,
    guest_session_id,
    members,
    created_at,
    updated_at
FROM trees";

/// Store interface for tree documents.
pub trait TreeStore {
    fn insert_tree(&self, tree: &Tree) -> StoreResult<()>;
    fn get_tree(&self, tree_id: TreeId) -> StoreResult<Option<Tree>>;
    /// Trees owned by a registered user, oldest first.
    fn list_trees_for_user(&self, user_id: UserId) -> StoreResult<Vec<Tree>>;
    /// Unclaimed trees created under a guest token, oldest first.
    fn list_trees_for_guest(&self, guest_session_id: &str) -> StoreResult<Vec<Tree>>;
    /// Every stored tree, oldest first. Used by offline maintenance.
    fn list_all_trees(&self) -> StoreResult<Vec<Tree>>;
    /// Rewrites name, description, privacy, and shareable link.
    fn update_tree_details(&self, tree: &Tree) -> StoreResult<()>;
    /// Appends a member id unless already present.
    fn push_member(&self, tree_id: TreeId, member_id: MemberId) -> StoreResult<bool>;
    /// Removes a member id when present.
    fn pull_member(&self, tree_id: TreeId, member_id: MemberId) -> StoreResult<bool>;
    fn delete_tree(&self, tree_id: TreeId) -> StoreResult<bool>;
    /// First unclaimed tree for a guest token, oldest first.
    fn find_unclaimed_by_guest(&self, guest_session_id: &str) -> StoreResult<Option<Tree>>;
    /// Moves ownership from a guest token to a user.
    ///
    /// Succeeds only while the tree is still owned by `guest_session_id`;
    /// returns `false` when another claim won the race.
    fn assign_owner(
        &self,
        tree_id: TreeId,
        guest_session_id: &str,
        user_id: UserId,
    ) -> StoreResult<bool>;
    fn find_by_shareable_link(&self, link: &str) -> StoreResult<Option<Tree>>;
}

/// SQLite-backed tree store.
#[derive(Clone, Copy)]
pub struct SqliteTreeStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTreeStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_ready(conn, TREE_TABLE, TREE_COLUMNS)?;
        Ok(Self { conn })
    }

    fn modify_members(
        &self,
        tree_id: TreeId,
        apply: impl FnOnce(&mut Vec<MemberId>) -> bool,
    ) -> StoreResult<bool> {
        let tx = begin_document_update(self.conn)?;
        let Some(mut tree) = load_tree(&tx, tree_id)? else {
            return Ok(false);
        };
        if !apply(&mut tree.members) {
            return Ok(false);
        }
        tx.execute(
            "UPDATE trees SET members = ?1, updated_at = ?2 WHERE tree_uuid = ?3;",
            params![
                encode_json(&tree.members, "trees.members")?,
                now_epoch_ms(),
                tree_id.to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn query_trees(&self, filter_sql: &str, value: &str) -> StoreResult<Vec<Tree>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TREE_SELECT_SQL}
             WHERE {filter_sql}
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([value])?;
        let mut trees = Vec::new();
        while let Some(row) = rows.next()? {
            trees.push(parse_tree_row(row)?);
        }
        Ok(trees)
    }
}

impl TreeStore for SqliteTreeStore<'_> {
    fn insert_tree(&self, tree: &Tree) -> StoreResult<()> {
        tree.validate()?;

        self.conn.execute(
            "INSERT INTO trees (
                tree_uuid,
                name,
                description,
                privacy,
                shareable_link,
                owner_uuid,
                guest_session_id,
                members,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                tree.id.to_string(),
                tree.name.trim(),
                tree.description.as_deref(),
                tree.privacy.as_str(),
                tree.shareable_link.as_deref(),
                tree.owner.user_id().map(|id| id.to_string()),
                tree.owner.guest_session_id(),
                encode_json(&tree.members, "trees.members")?,
                tree.created_at,
                tree.updated_at,
            ],
        )?;

        Ok(())
    }

    fn get_tree(&self, tree_id: TreeId) -> StoreResult<Option<Tree>> {
        load_tree(self.conn, tree_id)
    }

    fn list_trees_for_user(&self, user_id: UserId) -> StoreResult<Vec<Tree>> {
        self.query_trees("owner_uuid = ?1", &user_id.to_string())
    }

    fn list_trees_for_guest(&self, guest_session_id: &str) -> StoreResult<Vec<Tree>> {
        self.query_trees(
            "guest_session_id = ?1 AND owner_uuid IS NULL",
            guest_session_id,
        )
    }

    fn list_all_trees(&self) -> StoreResult<Vec<Tree>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TREE_SELECT_SQL}
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut trees = Vec::new();
        while let Some(row) = rows.next()? {
            trees.push(parse_tree_row(row)?);
        }
        Ok(trees)
    }

    fn update_tree_details(&self, tree: &Tree) -> StoreResult<()> {
        tree.validate()?;

        let changed = self.conn.execute(
            "UPDATE trees
             SET
                name = ?1,
                description = ?2,
                privacy = ?3,
                shareable_link = ?4,
                updated_at = ?5
             WHERE tree_uuid = ?6;",
            params![
                tree.name.trim(),
                tree.description.as_deref(),
                tree.privacy.as_str(),
                tree.shareable_link.as_deref(),
                now_epoch_ms(),
                tree.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                collection: TREE_TABLE,
                id: tree.id,
            });
        }
        Ok(())
    }

    fn push_member(&self, tree_id: TreeId, member_id: MemberId) -> StoreResult<bool> {
        self.modify_members(tree_id, |members| {
            if members.contains(&member_id) {
                return false;
            }
            members.push(member_id);
            true
        })
    }

    fn pull_member(&self, tree_id: TreeId, member_id: MemberId) -> StoreResult<bool> {
        self.modify_members(tree_id, |members| {
            let before = members.len();
            members.retain(|id| *id != member_id);
            members.len() != before
        })
    }

    fn delete_tree(&self, tree_id: TreeId) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM trees WHERE tree_uuid = ?1;", [tree_id.to_string()])?;
        Ok(changed > 0)
    }

    fn find_unclaimed_by_guest(&self, guest_session_id: &str) -> StoreResult<Option<Tree>> {
        Ok(self
            .list_trees_for_guest(guest_session_id)?
            .into_iter()
            .next())
    }

    fn assign_owner(
        &self,
        tree_id: TreeId,
        guest_session_id: &str,
        user_id: UserId,
    ) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE trees
             SET
                owner_uuid = ?1,
                guest_session_id = NULL,
                updated_at = ?2
             WHERE tree_uuid = ?3
               AND guest_session_id = ?4
               AND owner_uuid IS NULL;",
            params![
                user_id.to_string(),
                now_epoch_ms(),
                tree_id.to_string(),
                guest_session_id,
            ],
        )?;
        Ok(changed == 1)
    }

    fn find_by_shareable_link(&self, link: &str) -> StoreResult<Option<Tree>> {
        Ok(self.query_trees("shareable_link = ?1", link)?.into_iter().next())
    }
}

fn load_tree(conn: &Connection, tree_id: TreeId) -> StoreResult<Option<Tree>> {
    let mut stmt = conn.prepare(&format!("{TREE_SELECT_SQL} WHERE tree_uuid = ?1;"))?;
    let mut rows = stmt.query([tree_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_tree_row(row)?));
    }
    Ok(None)
}

fn parse_tree_row(row: &Row<'_>) -> StoreResult<Tree> {
    let id_text: String = row.get("tree_uuid")?;
    let id = parse_uuid(&id_text, "trees.tree_uuid")?;

    let privacy_text: String = row.get("privacy")?;
    let privacy = Privacy::parse(&privacy_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid privacy `{privacy_text}` in trees.privacy"))
    })?;

    let owner_uuid = parse_optional_uuid(row.get("owner_uuid")?, "trees.owner_uuid")?;
    let guest_session_id: Option<String> = row.get("guest_session_id")?;
    let owner = match (owner_uuid, guest_session_id) {
        (Some(user_id), None) => TreeOwner::User(user_id),
        (None, Some(token)) => TreeOwner::Guest(token),
        _ => {
            return Err(StoreError::InvalidData(format!(
                "tree {id} must have exactly one of owner_uuid, guest_session_id"
            )))
        }
    };

    let members_text: String = row.get("members")?;

    Ok(Tree {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        privacy,
        shareable_link: row.get("shareable_link")?,
        owner,
        members: decode_json(&members_text, "trees.members")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
