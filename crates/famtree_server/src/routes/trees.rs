use crate::auth::Caller;
use crate::error::{body, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use famtree_core::{AccessMode, SeedMember, Tree, TreeDetails, TreePatch, TreeView};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTreeRequest {
    #[serde(flatten)]
    pub details: TreeDetails,
    #[serde(default)]
    pub initial_members: Option<Vec<SeedMember>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTreeResponse {
    pub message: &'static str,
    pub members_deleted: usize,
}

pub async fn create_tree(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreateTreeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TreeView>)> {
    let request = body(payload)?;
    let requester = caller.requester();
    let view = state.with_stores(|stores| {
        let trees = stores.tree_service();
        match request.initial_members {
            Some(seed) => trees.create_tree_with_initial_members(&requester, request.details, seed),
            None => {
                let tree = trees.create_tree(&requester, request.details)?;
                Ok(TreeView {
                    tree,
                    members: Vec::new(),
                })
            }
        }
    })?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_trees(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<Tree>>> {
    let requester = caller.requester();
    let trees = state.with_stores(|stores| stores.tree_service().list_trees(&requester))?;
    Ok(Json(trees))
}

pub async fn get_tree(
    State(state): State<AppState>,
    caller: Caller,
    Path(tree_id): Path<String>,
) -> ApiResult<Json<TreeView>> {
    let requester = caller.requester();
    let view = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Read)?;
        stores.tree_service().tree_view(&tree)
    })?;
    Ok(Json(view))
}

pub async fn update_tree(
    State(state): State<AppState>,
    caller: Caller,
    Path(tree_id): Path<String>,
    payload: Result<Json<TreePatch>, JsonRejection>,
) -> ApiResult<Json<Tree>> {
    let patch = body(payload)?;
    let requester = caller.requester();
    let tree = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores.tree_service().update_tree(&tree, patch)
    })?;
    Ok(Json(tree))
}

pub async fn delete_tree(
    State(state): State<AppState>,
    caller: Caller,
    Path(tree_id): Path<String>,
) -> ApiResult<Json<DeleteTreeResponse>> {
    let requester = caller.requester();
    let members_deleted = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores.tree_service().delete_tree(&tree)
    })?;
    Ok(Json(DeleteTreeResponse {
        message: "family tree deleted",
        members_deleted,
    }))
}

/// Unauthenticated read of a tree published with a shareable link.
pub async fn shared_tree(
    State(state): State<AppState>,
    Path(link): Path<String>,
) -> ApiResult<Json<TreeView>> {
    let view = state.with_stores(|stores| stores.tree_service().shared_view(&link))?;
    Ok(Json(view))
}
