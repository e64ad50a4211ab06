//! Member store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist member documents, one row each, edges as JSON arrays.
//! - Offer duplicate-safe per-document edge updates for the relationship
//!   service to compose into cascades.
//!
//! # Invariants
//! - Every query is scoped to one tree; a member is never reachable through
//!   another tree's id.
//! - Each edge update reads and rewrites one row inside its own `IMMEDIATE`
//!   transaction, so concurrent writers cannot lose each other's set entries.
//! - Listing order is creation order.

use super::support::{
    begin_document_update, decode_json, encode_json, ensure_store_ready, parse_optional_uuid,
    parse_uuid,
};
use super::{StoreError, StoreResult};
use crate::model::member::{
    Gender, Member, MemberId, MemberProfile, MemberRole, ParentSlot, SpouseLink,
};
use crate::model::now_epoch_ms;
use crate::model::tree::TreeId;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const MEMBER_TABLE: &str = "members";

const MEMBER_COLUMNS: &[&str] = &[
    "member_uuid",
    "tree_uuid",
    "first_name",
    "last_name",
    "gender",
    "date_of_birth",
    "place_of_birth",
    "date_of_death",
    "place_of_death",
    "profile_picture_url",
    "biography",
    "mother_uuid",
    "father_uuid",
    "spouses",
    "children",
    "role",
    "created_at",
    "updated_at",
];

const MEMBER_SELECT_SQL: &str = "SELECT
    member_uuid,
    tree_uuid,
    first_name,
    last_name,
    gender,
    date_of_birth,
    place_of_birth,
    date_of_death,
    place_of_death,
    profile_picture_url,
    biography,
    mother_uuid,
    father_uuid,
    spouses,
    children,
    role,
    created_at,
    updated_at
FROM members";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Store interface for member documents.
pub trait MemberStore {
    /// Inserts a new member after creation-time validation.
    fn insert_member(&self, member: &Member) -> StoreResult<()>;
    /// Loads one member of a tree.
    fn get_member(&self, tree_id: TreeId, member_id: MemberId) -> StoreResult<Option<Member>>;
    /// Lists all members of a tree in creation order.
    fn list_members(&self, tree_id: TreeId) -> StoreResult<Vec<Member>>;
    /// Rewrites one member document, profile and edges.
    fn update_member(&self, member: &Member) -> StoreResult<()>;
    /// Deletes one member document. Returns `false` when already gone.
    fn delete_member(&self, tree_id: TreeId, member_id: MemberId) -> StoreResult<bool>;
    /// Deletes every member document of a tree.
    fn delete_members_in_tree(&self, tree_id: TreeId) -> StoreResult<usize>;

    /// Set-adds `child_id` to the parent's children.
    fn add_child(
        &self,
        tree_id: TreeId,
        parent_id: MemberId,
        child_id: MemberId,
    ) -> StoreResult<bool>;
    /// Set-removes `child_id` from the parent's children.
    fn remove_child(
        &self,
        tree_id: TreeId,
        parent_id: MemberId,
        child_id: MemberId,
    ) -> StoreResult<bool>;
    /// Set-adds a spouse link unless one to the same spouse exists.
    fn add_spouse(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        link: &SpouseLink,
    ) -> StoreResult<bool>;
    /// Set-removes the link to `spouse_id`.
    fn remove_spouse(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        spouse_id: MemberId,
    ) -> StoreResult<bool>;
    /// Sets or clears one parent field of a child.
    fn set_parent(
        &self,
        tree_id: TreeId,
        child_id: MemberId,
        slot: ParentSlot,
        parent_id: Option<MemberId>,
    ) -> StoreResult<bool>;

    /// Removes `child_id` from every children set in the tree.
    fn pull_child_everywhere(&self, tree_id: TreeId, child_id: MemberId) -> StoreResult<usize>;
    /// Clears every mother/father field equal to `parent_id` in the tree.
    fn clear_parent_everywhere(&self, tree_id: TreeId, parent_id: MemberId)
        -> StoreResult<usize>;
    /// Removes links to `spouse_id` from every spouse set in the tree.
    fn pull_spouse_everywhere(&self, tree_id: TreeId, spouse_id: MemberId) -> StoreResult<usize>;
}

/// SQLite-backed member store.
#[derive(Clone, Copy)]
pub struct SqliteMemberStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_ready(conn, MEMBER_TABLE, MEMBER_COLUMNS)?;
        Ok(Self { conn })
    }

    /// Applies `apply` to one member inside a single-document transaction.
    ///
    /// Missing documents and no-op closures leave storage untouched and
    /// return `false`.
    fn modify_member(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        apply: impl FnOnce(&mut Member) -> bool,
    ) -> StoreResult<bool> {
        let tx = begin_document_update(self.conn)?;
        let Some(mut member) = load_member(&tx, tree_id, member_id)? else {
            return Ok(false);
        };
        if !apply(&mut member) {
            return Ok(false);
        }
        member.validate()?;
        member.updated_at = now_epoch_ms();
        write_edges(&tx, &member)?;
        tx.commit()?;
        Ok(true)
    }

    /// Runs `apply` against every member of the tree, one document at a time.
    fn modify_each_member(
        &self,
        tree_id: TreeId,
        mut apply: impl FnMut(&mut Member) -> bool,
    ) -> StoreResult<usize> {
        let mut changed = 0;
        for member_id in list_member_ids(self.conn, tree_id)? {
            if self.modify_member(tree_id, member_id, &mut apply)? {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

impl MemberStore for SqliteMemberStore<'_> {
    fn insert_member(&self, member: &Member) -> StoreResult<()> {
        member.validate_new()?;

        self.conn.execute(
            "INSERT INTO members (
                member_uuid,
                tree_uuid,
                first_name,
                last_name,
                gender,
                date_of_birth,
                place_of_birth,
                date_of_death,
                place_of_death,
                profile_picture_url,
                biography,
                mother_uuid,
                father_uuid,
                spouses,
                children,
                role,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18);",
            params![
                member.id.to_string(),
                member.tree_id.to_string(),
                member.profile.first_name.trim(),
                member.profile.last_name.as_deref(),
                member.profile.gender.as_str(),
                member.profile.date_of_birth.map(format_date),
                member.profile.place_of_birth.as_deref(),
                member.profile.date_of_death.map(format_date),
                member.profile.place_of_death.as_deref(),
                member.profile.profile_picture_url.as_deref(),
                member.profile.biography.as_deref(),
                member.mother.map(|id| id.to_string()),
                member.father.map(|id| id.to_string()),
                encode_json(&member.spouses, "members.spouses")?,
                encode_json(&member.children, "members.children")?,
                member.role.as_str(),
                member.created_at,
                member.updated_at,
            ],
        )?;

        Ok(())
    }

    fn get_member(&self, tree_id: TreeId, member_id: MemberId) -> StoreResult<Option<Member>> {
        load_member(self.conn, tree_id, member_id)
    }

    fn list_members(&self, tree_id: TreeId) -> StoreResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE tree_uuid = ?1
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([tree_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }
        Ok(members)
    }

    fn update_member(&self, member: &Member) -> StoreResult<()> {
        member.validate()?;

        let changed = self.conn.execute(
            "UPDATE members
             SET
                first_name = ?1,
                last_name = ?2,
                gender = ?3,
                date_of_birth = ?4,
                place_of_birth = ?5,
                date_of_death = ?6,
                place_of_death = ?7,
                profile_picture_url = ?8,
                biography = ?9,
                mother_uuid = ?10,
                father_uuid = ?11,
                spouses = ?12,
                children = ?13,
                updated_at = ?14
             WHERE member_uuid = ?15
               AND tree_uuid = ?16;",
            params![
                member.profile.first_name.trim(),
                member.profile.last_name.as_deref(),
                member.profile.gender.as_str(),
                member.profile.date_of_birth.map(format_date),
                member.profile.place_of_birth.as_deref(),
                member.profile.date_of_death.map(format_date),
                member.profile.place_of_death.as_deref(),
                member.profile.profile_picture_url.as_deref(),
                member.profile.biography.as_deref(),
                member.mother.map(|id| id.to_string()),
                member.father.map(|id| id.to_string()),
                encode_json(&member.spouses, "members.spouses")?,
                encode_json(&member.children, "members.children")?,
                now_epoch_ms(),
                member.id.to_string(),
                member.tree_id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                collection: MEMBER_TABLE,
                id: member.id,
            });
        }
        Ok(())
    }

    fn delete_member(&self, tree_id: TreeId, member_id: MemberId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM members WHERE member_uuid = ?1 AND tree_uuid = ?2;",
            [member_id.to_string(), tree_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn delete_members_in_tree(&self, tree_id: TreeId) -> StoreResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM members WHERE tree_uuid = ?1;",
            [tree_id.to_string()],
        )?;
        Ok(changed)
    }

    fn add_child(
        &self,
        tree_id: TreeId,
        parent_id: MemberId,
        child_id: MemberId,
    ) -> StoreResult<bool> {
        self.modify_member(tree_id, parent_id, |parent| parent.insert_child(child_id))
    }

    fn remove_child(
        &self,
        tree_id: TreeId,
        parent_id: MemberId,
        child_id: MemberId,
    ) -> StoreResult<bool> {
        self.modify_member(tree_id, parent_id, |parent| parent.remove_child(child_id))
    }

    fn add_spouse(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        link: &SpouseLink,
    ) -> StoreResult<bool> {
        self.modify_member(tree_id, member_id, |member| {
            member.insert_spouse(link.clone())
        })
    }

    fn remove_spouse(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        spouse_id: MemberId,
    ) -> StoreResult<bool> {
        self.modify_member(tree_id, member_id, |member| member.remove_spouse(spouse_id))
    }

    fn set_parent(
        &self,
        tree_id: TreeId,
        child_id: MemberId,
        slot: ParentSlot,
        parent_id: Option<MemberId>,
    ) -> StoreResult<bool> {
        self.modify_member(tree_id, child_id, |child| {
            if child.parent(slot) == parent_id {
                return false;
            }
            child.set_parent(slot, parent_id);
            true
        })
    }

    fn pull_child_everywhere(&self, tree_id: TreeId, child_id: MemberId) -> StoreResult<usize> {
        self.modify_each_member(tree_id, |member| member.remove_child(child_id))
    }

    fn clear_parent_everywhere(
        &self,
        tree_id: TreeId,
        parent_id: MemberId,
    ) -> StoreResult<usize> {
        self.modify_each_member(tree_id, |member| member.clear_parent_ref(parent_id))
    }

    fn pull_spouse_everywhere(&self, tree_id: TreeId, spouse_id: MemberId) -> StoreResult<usize> {
        self.modify_each_member(tree_id, |member| member.remove_spouse(spouse_id))
    }
}

fn load_member(
    conn: &Connection,
    tree_id: TreeId,
    member_id: MemberId,
) -> StoreResult<Option<Member>> {
    let mut stmt = conn.prepare(&format!(
        "{MEMBER_SELECT_SQL}
         WHERE member_uuid = ?1
           AND tree_uuid = ?2;"
    ))?;
    let mut rows = stmt.query([member_id.to_string(), tree_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_member_row(row)?));
    }
    Ok(None)
}

fn list_member_ids(conn: &Connection, tree_id: TreeId) -> StoreResult<Vec<MemberId>> {
    let mut stmt = conn.prepare(
        "SELECT member_uuid
         FROM members
         WHERE tree_uuid = ?1
         ORDER BY created_at ASC, rowid ASC;",
    )?;
    let mut rows = stmt.query([tree_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "members.member_uuid")?);
    }
    Ok(ids)
}

fn write_edges(conn: &Connection, member: &Member) -> StoreResult<()> {
    conn.execute(
        "UPDATE members
         SET
            mother_uuid = ?1,
            father_uuid = ?2,
            spouses = ?3,
            children = ?4,
            updated_at = ?5
         WHERE member_uuid = ?6
           AND tree_uuid = ?7;",
        params![
            member.mother.map(|id| id.to_string()),
            member.father.map(|id| id.to_string()),
            encode_json(&member.spouses, "members.spouses")?,
            encode_json(&member.children, "members.children")?,
            member.updated_at,
            member.id.to_string(),
            member.tree_id.to_string(),
        ],
    )?;
    Ok(())
}

fn parse_member_row(row: &Row<'_>) -> StoreResult<Member> {
    let id_text: String = row.get("member_uuid")?;
    let tree_text: String = row.get("tree_uuid")?;

    let gender_text: String = row.get("gender")?;
    let gender = Gender::parse(&gender_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid gender `{gender_text}` in members.gender"))
    })?;

    let role_text: String = row.get("role")?;
    let role = MemberRole::parse(&role_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid role `{role_text}` in members.role"))
    })?;

    let spouses_text: String = row.get("spouses")?;
    let children_text: String = row.get("children")?;

    let member = Member {
        id: parse_uuid(&id_text, "members.member_uuid")?,
        tree_id: parse_uuid(&tree_text, "members.tree_uuid")?,
        profile: MemberProfile {
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            gender,
            date_of_birth: parse_optional_date(row.get("date_of_birth")?, "members.date_of_birth")?,
            place_of_birth: row.get("place_of_birth")?,
            date_of_death: parse_optional_date(row.get("date_of_death")?, "members.date_of_death")?,
            place_of_death: row.get("place_of_death")?,
            profile_picture_url: row.get("profile_picture_url")?,
            biography: row.get("biography")?,
        },
        role,
        mother: parse_optional_uuid(row.get("mother_uuid")?, "members.mother_uuid")?,
        father: parse_optional_uuid(row.get("father_uuid")?, "members.father_uuid")?,
        spouses: decode_json(&spouses_text, "members.spouses")?,
        children: decode_json(&children_text, "members.children")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    member
        .validate()
        .map_err(|err| StoreError::InvalidData(format!("member {}: {err}", member.id)))?;
    Ok(member)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_optional_date(value: Option<String>, column: &'static str) -> StoreResult<Option<NaiveDate>> {
    value
        .map(|text| {
            NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|_| {
                StoreError::InvalidData(format!("invalid date `{text}` in {column}"))
            })
        })
        .transpose()
}
