//! Route table.
//!
//! Every tree-scoped route authorizes through the access guard before
//! touching member documents.

mod members;
mod sessions;
mod trees;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use famtree_core::{FamilyError, FamilyResult};
use uuid::Uuid;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(sessions::health))
        .route("/auth/me", get(sessions::me))
        .route("/auth/sync-user", post(sessions::sync_user))
        .route("/guest-sessions/start", post(sessions::start_guest_session))
        .route("/guest-sessions/claim", post(sessions::claim_guest_session))
        .route("/trees", post(trees::create_tree).get(trees::list_trees))
        .route("/shared/:link", get(trees::shared_tree))
        .route(
            "/trees/:tree_id",
            get(trees::get_tree)
                .put(trees::update_tree)
                .delete(trees::delete_tree),
        )
        .route(
            "/trees/:tree_id/members",
            post(members::add_member).get(members::list_members),
        )
        .route(
            "/trees/:tree_id/members/:member_id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        .route(
            "/trees/:tree_id/members/:member_id/add-sibling",
            post(members::add_sibling),
        )
        .route(
            "/trees/:tree_id/members/:member_id/add-spouse",
            post(members::add_spouse),
        )
        .route(
            "/trees/:tree_id/members/:member_id/add-child",
            post(members::add_child),
        )
        .route(
            "/trees/:tree_id/members/:member_id/link-parent/:parent_id",
            post(members::link_parent).delete(members::unlink_parent),
        )
        .route(
            "/trees/:tree_id/members/:member_id/link-spouse/:spouse_id",
            post(members::link_spouse).delete(members::unlink_spouse),
        )
        .route(
            "/trees/:tree_id/members/:member_id/delete-sibling",
            axum::routing::delete(members::delete_sibling),
        )
        .with_state(state)
}

fn parse_member_id(raw: &str) -> FamilyResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| FamilyError::InvalidArgument(format!("invalid member id format: {raw}")))
}
