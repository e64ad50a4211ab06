//! Guest sessions and ownership transfer.
//!
//! # Responsibility
//! - Issue guest tokens for visitors who build a tree before signing in.
//! - Transfer a guest-owned tree to a registered user (claim).
//!
//! # Invariants
//! - A guest token owns at most one unclaimed tree.
//! - Claim is one-way and single-use: the owner swap clears the guest token
//!   in the same conditional update, so a second claim finds nothing.

use crate::error::{FamilyError, FamilyResult};
use crate::model::tree::Tree;
use crate::model::user::UserId;
use crate::repo::tree_repo::TreeStore;
use crate::repo::user_repo::UserStore;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static GUEST_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("valid guest token regex"));

/// Fresh guest token: 128 random bits as 32 lowercase hex chars.
pub fn new_guest_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn is_valid_guest_token(token: &str) -> bool {
    GUEST_TOKEN_RE.is_match(token)
}

pub struct GuestSessionService<T: TreeStore, U: UserStore> {
    trees: T,
    users: U,
}

impl<T: TreeStore, U: UserStore> GuestSessionService<T, U> {
    pub fn new(trees: T, users: U) -> Self {
        Self { trees, users }
    }

    /// Starts a guest session and returns its token.
    pub fn start_session(&self) -> String {
        let token = new_guest_token();
        info!("event=guest_session_start module=guest status=ok");
        token
    }

    /// Moves the unclaimed tree created under `guest_token` to `user_id`.
    ///
    /// # Errors
    /// - `InvalidArgument` for a malformed token.
    /// - `NotFound` for an unknown user, or when no unclaimed tree exists
    ///   for the token (including a token that was already claimed).
    pub fn claim(&self, guest_token: &str, user_id: UserId) -> FamilyResult<Tree> {
        let guest_token = guest_token.trim();
        if !is_valid_guest_token(guest_token) {
            return Err(FamilyError::InvalidArgument(
                "guest session id is missing or malformed".to_string(),
            ));
        }
        if self.users.get_user(user_id)?.is_none() {
            return Err(FamilyError::NotFound(format!("user not found: {user_id}")));
        }

        let Some(tree) = self.trees.find_unclaimed_by_guest(guest_token)? else {
            warn!("event=guest_claim module=guest status=not_found user_id={user_id}");
            return Err(no_unclaimed_tree());
        };
        if !self.trees.assign_owner(tree.id, guest_token, user_id)? {
            warn!(
                "event=guest_claim module=guest status=lost_race tree_id={} user_id={}",
                tree.id, user_id
            );
            return Err(no_unclaimed_tree());
        }
        self.users.add_tree(user_id, tree.id)?;

        info!(
            "event=guest_claim module=guest status=ok tree_id={} user_id={}",
            tree.id, user_id
        );
        self.trees.get_tree(tree.id)?.ok_or_else(no_unclaimed_tree)
    }
}

fn no_unclaimed_tree() -> FamilyError {
    FamilyError::NotFound(
        "no unclaimed tree found for this guest session, or tree already claimed".to_string(),
    )
}
