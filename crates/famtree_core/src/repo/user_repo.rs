//! User store contracts and SQLite implementation.
//!
//! # Invariants
//! - `subject` is unique; one local user per external identity.
//! - `family_trees` keeps acquisition order and never holds duplicates.

use super::support::{
    begin_document_update, decode_json, encode_json, ensure_store_ready, parse_uuid,
};
use super::{StoreError, StoreResult};
use crate::model::now_epoch_ms;
use crate::model::tree::TreeId;
use crate::model::user::{User, UserId};
use rusqlite::{params, Connection, Row};

const USER_TABLE: &str = "users";

const USER_COLUMNS: &[&str] = &[
    "user_uuid",
    "subject",
    "email",
    "display_name",
    "profile_picture",
    "family_trees",
    "created_at",
    "updated_at",
];

const USER_SELECT_SQL: &str = "SELECT
    user_uuid,
    subject,
    email,
    display_name,
    profile_picture,
    family_trees,
    created_at,
    updated_at
FROM users";

/// Store interface for user records.
pub trait UserStore {
    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>>;
    fn find_by_subject(&self, subject: &str) -> StoreResult<Option<User>>;
    fn insert_user(&self, user: &User) -> StoreResult<()>;
    /// Rewrites email, display name, and picture.
    fn update_profile(&self, user: &User) -> StoreResult<()>;
    /// Set-adds a tree id to the user's list.
    fn add_tree(&self, user_id: UserId, tree_id: TreeId) -> StoreResult<bool>;
    /// Removes a tree id from the user's list.
    fn remove_tree(&self, user_id: UserId, tree_id: TreeId) -> StoreResult<bool>;
}

/// SQLite-backed user store.
#[derive(Clone, Copy)]
pub struct SqliteUserStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_ready(conn, USER_TABLE, USER_COLUMNS)?;
        Ok(Self { conn })
    }

    fn modify_trees(
        &self,
        user_id: UserId,
        apply: impl FnOnce(&mut Vec<TreeId>) -> bool,
    ) -> StoreResult<bool> {
        let tx = begin_document_update(self.conn)?;
        let Some(mut user) = load_user(&tx, "user_uuid", &user_id.to_string())? else {
            return Err(StoreError::NotFound {
                collection: USER_TABLE,
                id: user_id,
            });
        };
        if !apply(&mut user.family_trees) {
            return Ok(false);
        }
        tx.execute(
            "UPDATE users SET family_trees = ?1, updated_at = ?2 WHERE user_uuid = ?3;",
            params![
                encode_json(&user.family_trees, "users.family_trees")?,
                now_epoch_ms(),
                user_id.to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }
}

impl UserStore for SqliteUserStore<'_> {
    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        load_user(self.conn, "user_uuid", &user_id.to_string())
    }

    fn find_by_subject(&self, subject: &str) -> StoreResult<Option<User>> {
        load_user(self.conn, "subject", subject)
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        if user.subject.trim().is_empty() {
            return Err(StoreError::InvalidData(
                "user subject must not be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO users (
                user_uuid,
                subject,
                email,
                display_name,
                profile_picture,
                family_trees,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                user.id.to_string(),
                user.subject,
                user.email.as_deref(),
                user.display_name.as_deref(),
                user.profile_picture.as_deref(),
                encode_json(&user.family_trees, "users.family_trees")?,
                user.created_at,
                user.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update_profile(&self, user: &User) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                email = ?1,
                display_name = ?2,
                profile_picture = ?3,
                updated_at = ?4
             WHERE user_uuid = ?5;",
            params![
                user.email.as_deref(),
                user.display_name.as_deref(),
                user.profile_picture.as_deref(),
                now_epoch_ms(),
                user.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                collection: USER_TABLE,
                id: user.id,
            });
        }
        Ok(())
    }

    fn add_tree(&self, user_id: UserId, tree_id: TreeId) -> StoreResult<bool> {
        self.modify_trees(user_id, |trees| {
            if trees.contains(&tree_id) {
                return false;
            }
            trees.push(tree_id);
            true
        })
    }

    fn remove_tree(&self, user_id: UserId, tree_id: TreeId) -> StoreResult<bool> {
        self.modify_trees(user_id, |trees| {
            let before = trees.len();
            trees.retain(|id| *id != tree_id);
            trees.len() != before
        })
    }
}

fn load_user(conn: &Connection, key_column: &str, value: &str) -> StoreResult<Option<User>> {
    let mut stmt = conn.prepare(&format!("{USER_SELECT_SQL} WHERE {key_column} = ?1;"))?;
    let mut rows = stmt.query([value])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_user_row(row)?));
    }
    Ok(None)
}

fn parse_user_row(row: &Row<'_>) -> StoreResult<User> {
    let id_text: String = row.get("user_uuid")?;
    let trees_text: String = row.get("family_trees")?;

    Ok(User {
        id: parse_uuid(&id_text, "users.user_uuid")?,
        subject: row.get("subject")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        profile_picture: row.get("profile_picture")?,
        family_trees: decode_json(&trees_text, "users.family_trees")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
