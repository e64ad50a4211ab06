//! Tree access decisions.
//!
//! # Responsibility
//! - Resolve a raw tree id and decide whether a requester may use the tree.
//!
//! # Invariants
//! - Access is granted to the tree's user owner, or to the guest token that
//!   created a still-unclaimed tree. Nobody else.
//! - Read and write follow the same rule.
//! - Every decision is logged without personal data.

use crate::error::{FamilyError, FamilyResult};
use crate::model::tree::{Tree, TreeOwner};
use crate::model::user::UserId;
use crate::repo::tree_repo::TreeStore;
use log::{info, warn};
use uuid::Uuid;

/// Identity a request acts under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    User(UserId),
    Guest(String),
}

impl Requester {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Guest(_) => "guest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Whether `requester` may access `tree`.
pub fn can_access(tree: &Tree, requester: &Requester) -> bool {
    match (&tree.owner, requester) {
        (TreeOwner::User(owner), Requester::User(user)) => owner == user,
        (TreeOwner::Guest(owner_token), Requester::Guest(token)) => owner_token == token,
        _ => false,
    }
}

pub struct AccessGuard<T: TreeStore> {
    trees: T,
}

impl<T: TreeStore> AccessGuard<T> {
    pub fn new(trees: T) -> Self {
        Self { trees }
    }

    /// Loads the tree named by `raw_tree_id` if `requester` may use it.
    ///
    /// # Errors
    /// - `NotFound` for a malformed id or a missing tree.
    /// - `Denied` when the tree belongs to someone else.
    pub fn authorize(
        &self,
        raw_tree_id: &str,
        requester: &Requester,
        mode: AccessMode,
    ) -> FamilyResult<Tree> {
        let Ok(tree_id) = Uuid::parse_str(raw_tree_id.trim()) else {
            warn!(
                "event=tree_access module=access status=not_found reason=malformed_id requester={} mode={}",
                requester.kind(),
                mode.as_str()
            );
            return Err(FamilyError::NotFound("family tree not found".to_string()));
        };

        let Some(tree) = self.trees.get_tree(tree_id)? else {
            warn!(
                "event=tree_access module=access status=not_found tree_id={} requester={} mode={}",
                tree_id,
                requester.kind(),
                mode.as_str()
            );
            return Err(FamilyError::NotFound("family tree not found".to_string()));
        };

        if !can_access(&tree, requester) {
            warn!(
                "event=tree_access module=access status=denied tree_id={} requester={} mode={}",
                tree_id,
                requester.kind(),
                mode.as_str()
            );
            return Err(FamilyError::Denied(
                "not authorized to access this family tree".to_string(),
            ));
        }

        info!(
            "event=tree_access module=access status=granted tree_id={} requester={} mode={}",
            tree_id,
            requester.kind(),
            mode.as_str()
        );
        Ok(tree)
    }
}
