use super::parse_member_id;
use crate::auth::Caller;
use crate::error::{body, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use famtree_core::{
    AccessMode, DeleteSummary, FamilyError, Member, MemberPatch, MemberProfile, NewChild,
    NewMember, NewSpouse, ParentSlot,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub slot: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSpouseRequest {
    #[serde(default)]
    pub relationship_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SpousePair {
    pub member: Member,
    pub spouse: Member,
}

#[derive(Debug, Serialize)]
pub struct DeleteMemberResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub summary: DeleteSummary,
}

fn parse_slot(raw: Option<&str>) -> Result<Option<ParentSlot>, FamilyError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => ParentSlot::parse(value).map(Some).ok_or_else(|| {
            FamilyError::InvalidArgument(format!(
                "unknown parent slot `{value}`; expected mother or father"
            ))
        }),
    }
}

pub async fn list_members(
    State(state): State<AppState>,
    caller: Caller,
    Path(tree_id): Path<String>,
) -> ApiResult<Json<Vec<Member>>> {
    let requester = caller.requester();
    let members = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Read)?;
        stores.relationships().list_members(&tree)
    })?;
    Ok(Json(members))
}

pub async fn get_member(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id)): Path<(String, String)>,
) -> ApiResult<Json<Member>> {
    let requester = caller.requester();
    let member = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Read)?;
        stores
            .relationships()
            .get_member(&tree, parse_member_id(&member_id)?)
    })?;
    Ok(Json(member))
}

pub async fn add_member(
    State(state): State<AppState>,
    caller: Caller,
    Path(tree_id): Path<String>,
    payload: Result<Json<NewMember>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let draft = body(payload)?;
    let requester = caller.requester();
    let member = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores.relationships().add_member(&tree, draft)
    })?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_member(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id)): Path<(String, String)>,
    payload: Result<Json<MemberPatch>, JsonRejection>,
) -> ApiResult<Json<Member>> {
    let patch = body(payload)?;
    let requester = caller.requester();
    let member = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores
            .relationships()
            .update_member(&tree, parse_member_id(&member_id)?, patch)
    })?;
    Ok(Json(member))
}

pub async fn delete_member(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id)): Path<(String, String)>,
) -> ApiResult<Json<DeleteMemberResponse>> {
    let requester = caller.requester();
    let summary = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores
            .relationships()
            .delete_member(&tree, parse_member_id(&member_id)?)
    })?;
    Ok(Json(DeleteMemberResponse {
        message: "member deleted",
        summary,
    }))
}

pub async fn add_sibling(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id)): Path<(String, String)>,
    payload: Result<Json<MemberProfile>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let profile = body(payload)?;
    let requester = caller.requester();
    let sibling = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores
            .relationships()
            .add_sibling(&tree, parse_member_id(&member_id)?, profile)
    })?;
    Ok((StatusCode::CREATED, Json(sibling)))
}

pub async fn add_spouse(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id)): Path<(String, String)>,
    payload: Result<Json<NewSpouse>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let draft = body(payload)?;
    let requester = caller.requester();
    let spouse = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores
            .relationships()
            .add_spouse(&tree, parse_member_id(&member_id)?, draft)
    })?;
    Ok((StatusCode::CREATED, Json(spouse)))
}

pub async fn add_child(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id)): Path<(String, String)>,
    payload: Result<Json<NewChild>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let draft = body(payload)?;
    let requester = caller.requester();
    let child = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores
            .relationships()
            .add_child(&tree, parse_member_id(&member_id)?, draft)
    })?;
    Ok((StatusCode::CREATED, Json(child)))
}

pub async fn link_parent(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id, parent_id)): Path<(String, String, String)>,
    Query(query): Query<SlotQuery>,
) -> ApiResult<Json<Member>> {
    let slot = parse_slot(query.slot.as_deref())?;
    let requester = caller.requester();
    let child = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores.relationships().link_parent(
            &tree,
            parse_member_id(&member_id)?,
            parse_member_id(&parent_id)?,
            slot,
        )
    })?;
    Ok(Json(child))
}

pub async fn unlink_parent(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id, parent_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Member>> {
    let requester = caller.requester();
    let child = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores.relationships().unlink_parent(
            &tree,
            parse_member_id(&member_id)?,
            parse_member_id(&parent_id)?,
        )
    })?;
    Ok(Json(child))
}

pub async fn link_spouse(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id, spouse_id)): Path<(String, String, String)>,
    payload: Result<Json<LinkSpouseRequest>, JsonRejection>,
) -> ApiResult<Json<SpousePair>> {
    let request = match payload {
        Err(JsonRejection::MissingJsonContentType(_)) => LinkSpouseRequest::default(),
        other => body(other)?,
    };
    let requester = caller.requester();
    let (member, spouse) = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores.relationships().link_spouse(
            &tree,
            parse_member_id(&member_id)?,
            parse_member_id(&spouse_id)?,
            request.relationship_type,
        )
    })?;
    Ok(Json(SpousePair { member, spouse }))
}

pub async fn unlink_spouse(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id, spouse_id)): Path<(String, String, String)>,
) -> ApiResult<Json<SpousePair>> {
    let requester = caller.requester();
    let (member, spouse) = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores.relationships().unlink_spouse(
            &tree,
            parse_member_id(&member_id)?,
            parse_member_id(&spouse_id)?,
        )
    })?;
    Ok(Json(SpousePair { member, spouse }))
}

pub async fn delete_sibling(
    State(state): State<AppState>,
    caller: Caller,
    Path((tree_id, member_id)): Path<(String, String)>,
) -> ApiResult<Json<DeleteMemberResponse>> {
    let requester = caller.requester();
    let summary = state.with_stores(|stores| {
        let tree = stores.guard().authorize(&tree_id, &requester, AccessMode::Write)?;
        stores
            .relationships()
            .delete_sibling(&tree, parse_member_id(&member_id)?)
    })?;
    Ok(Json(DeleteMemberResponse {
        message: "sibling deleted",
        summary,
    }))
}
