//! Family tree use-case service.
//!
//! # Responsibility
//! - Create trees for users and guests, optionally seeded with the
//!   reference person and both parents.
//! - List, view, update, and delete trees.
//!
//! # Invariants
//! - Seeded members go through the relationship mutator, so a fresh tree
//!   already satisfies every edge invariant.
//! - A user-owned tree is listed in its owner's tree list.
//! - `public_link` trees carry a shareable link; `private` trees never do.

use crate::error::{FamilyError, FamilyResult};
use crate::model::member::{Member, MemberProfile, MemberRole};
use crate::model::tree::{normalize_description, Privacy, Tree, TreeOwner};
use crate::repo::member_repo::MemberStore;
use crate::repo::tree_repo::TreeStore;
use crate::repo::user_repo::UserStore;
use crate::service::access_guard::Requester;
use crate::service::guest_session_service::is_valid_guest_token;
use crate::service::relationship_service::{NewMember, RelationshipService};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Input for a new tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDetails {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub privacy: Option<Privacy>,
}

impl TreeDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            privacy: None,
        }
    }
}

/// One seeded member: a profile tagged with its role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedMember {
    #[serde(flatten)]
    pub profile: MemberProfile,
    pub role: MemberRole,
}

impl SeedMember {
    pub fn new(profile: MemberProfile, role: MemberRole) -> Self {
        Self { profile, role }
    }
}

/// Partial tree update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub privacy: Option<Privacy>,
}

impl TreePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A tree with its member documents in tree-list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView {
    pub tree: Tree,
    pub members: Vec<Member>,
}

pub struct TreeService<M: MemberStore, T: TreeStore, U: UserStore> {
    members: M,
    trees: T,
    users: U,
}

impl<M, T, U> TreeService<M, T, U>
where
    M: MemberStore + Clone,
    T: TreeStore + Clone,
    U: UserStore,
{
    pub fn new(members: M, trees: T, users: U) -> Self {
        Self {
            members,
            trees,
            users,
        }
    }

    /// Creates an empty tree owned by `owner`.
    ///
    /// # Errors
    /// - `InvalidArgument` for a blank name or malformed guest token.
    /// - `NotFound` for an unknown user.
    /// - `InvalidState` when the guest token already owns an unclaimed tree.
    pub fn create_tree(&self, owner: &Requester, details: TreeDetails) -> FamilyResult<Tree> {
        let tree_owner = self.resolve_owner(owner)?;
        let mut tree = Tree::new(details.name, details.description, tree_owner);
        set_privacy(&mut tree, details.privacy.unwrap_or_default());
        tree.validate()?;

        self.trees.insert_tree(&tree)?;
        if let TreeOwner::User(user_id) = tree.owner {
            self.users.add_tree(user_id, tree.id)?;
        }

        info!(
            "event=tree_create module=tree status=ok tree_id={} owner={} privacy={}",
            tree.id,
            owner.kind(),
            tree.privacy.as_str()
        );
        Ok(tree)
    }

    /// Creates a tree holding the reference person and both parents.
    ///
    /// Members are created mother, father, then self, so the tree list reads
    /// `[mother, father, self]` and both parents list self as a child.
    pub fn create_tree_with_initial_members(
        &self,
        owner: &Requester,
        details: TreeDetails,
        seed: Vec<SeedMember>,
    ) -> FamilyResult<TreeView> {
        let pick = |role: MemberRole| {
            seed.iter()
                .find(|member| member.role == role)
                .map(|member| member.profile.clone())
        };
        let (Some(reference), Some(mother), Some(father)) = (
            pick(MemberRole::Reference),
            pick(MemberRole::Mother),
            pick(MemberRole::Father),
        ) else {
            return Err(FamilyError::InvalidArgument(
                "initial members must include all of: self, mother, father".to_string(),
            ));
        };
        for profile in [&reference, &mother, &father] {
            Member::new(Uuid::nil(), profile.clone(), MemberRole::Child).validate()?;
        }

        let tree = self.create_tree(owner, details)?;
        let relationships = self.relationships();
        let mother = relationships.add_member(&tree, NewMember::new(mother, MemberRole::Mother))?;
        let father = relationships.add_member(&tree, NewMember::new(father, MemberRole::Father))?;
        relationships.add_member(
            &tree,
            NewMember::new(reference, MemberRole::Reference).with_parents(mother.id, father.id),
        )?;

        let tree = self.reload(&tree)?;
        self.tree_view(&tree)
    }

    /// Trees visible to the requester, oldest first.
    pub fn list_trees(&self, requester: &Requester) -> FamilyResult<Vec<Tree>> {
        let trees = match requester {
            Requester::User(user_id) => self.trees.list_trees_for_user(*user_id)?,
            Requester::Guest(token) => self.trees.list_trees_for_guest(token)?,
        };
        Ok(trees)
    }

    /// The tree plus its member documents in tree-list order.
    pub fn tree_view(&self, tree: &Tree) -> FamilyResult<TreeView> {
        let mut by_id: HashMap<_, _> = self
            .members
            .list_members(tree.id)?
            .into_iter()
            .map(|member| (member.id, member))
            .collect();
        let members = tree
            .members
            .iter()
            .filter_map(|member_id| by_id.remove(member_id))
            .collect();

        Ok(TreeView {
            tree: tree.clone(),
            members,
        })
    }

    /// Updates name, description, and privacy.
    pub fn update_tree(&self, tree: &Tree, patch: TreePatch) -> FamilyResult<Tree> {
        if patch.is_empty() {
            return Err(FamilyError::InvalidArgument(
                "no update fields provided".to_string(),
            ));
        }

        let mut updated = tree.clone();
        if let Some(name) = patch.name {
            updated.name = name.trim().to_string();
        }
        if patch.description.is_some() {
            updated.description = normalize_description(patch.description);
        }
        if let Some(privacy) = patch.privacy {
            set_privacy(&mut updated, privacy);
        }
        updated.validate()?;
        self.trees.update_tree_details(&updated)?;

        info!(
            "event=tree_update module=tree status=ok tree_id={} privacy={} has_link={}",
            updated.id,
            updated.privacy.as_str(),
            updated.shareable_link.is_some()
        );
        self.reload(&updated)
    }

    /// Read-only view of a tree published through its shareable link.
    ///
    /// Unknown links and trees switched back to private are `NotFound`.
    pub fn shared_view(&self, link: &str) -> FamilyResult<TreeView> {
        let tree = self
            .trees
            .find_by_shareable_link(link.trim())?
            .filter(|tree| tree.privacy != Privacy::Private)
            .ok_or_else(|| FamilyError::NotFound("shared family tree not found".to_string()))?;

        info!(
            "event=tree_shared_view module=tree status=ok tree_id={}",
            tree.id
        );
        self.tree_view(&tree)
    }

    /// Deletes every member of the tree, then the tree itself.
    pub fn delete_tree(&self, tree: &Tree) -> FamilyResult<usize> {
        let deleted_members = self.members.delete_members_in_tree(tree.id)?;
        if let TreeOwner::User(user_id) = tree.owner {
            if self.users.get_user(user_id)?.is_some() {
                self.users.remove_tree(user_id, tree.id)?;
            }
        }
        self.trees.delete_tree(tree.id)?;

        info!(
            "event=tree_delete module=tree status=ok tree_id={} members_deleted={}",
            tree.id, deleted_members
        );
        Ok(deleted_members)
    }

    fn relationships(&self) -> RelationshipService<M, T> {
        RelationshipService::new(self.members.clone(), self.trees.clone())
    }

    fn reload(&self, tree: &Tree) -> FamilyResult<Tree> {
        self.trees
            .get_tree(tree.id)?
            .ok_or_else(|| FamilyError::NotFound(format!("family tree not found: {}", tree.id)))
    }

    fn resolve_owner(&self, owner: &Requester) -> FamilyResult<TreeOwner> {
        match owner {
            Requester::User(user_id) => {
                if self.users.get_user(*user_id)?.is_none() {
                    return Err(FamilyError::NotFound(format!("user not found: {user_id}")));
                }
                Ok(TreeOwner::User(*user_id))
            }
            Requester::Guest(token) => {
                if !is_valid_guest_token(token) {
                    return Err(FamilyError::InvalidArgument(
                        "guest session id is missing or malformed".to_string(),
                    ));
                }
                if self.trees.find_unclaimed_by_guest(token)?.is_some() {
                    return Err(FamilyError::InvalidState(
                        "guest session already has a family tree".to_string(),
                    ));
                }
                Ok(TreeOwner::Guest(token.clone()))
            }
        }
    }
}

fn set_privacy(tree: &mut Tree, privacy: Privacy) {
    tree.privacy = privacy;
    match privacy {
        Privacy::PublicLink => {
            if tree.shareable_link.is_none() {
                tree.shareable_link = Some(Uuid::new_v4().simple().to_string());
            }
        }
        Privacy::Private => tree.shareable_link = None,
        Privacy::Public => {}
    }
}
