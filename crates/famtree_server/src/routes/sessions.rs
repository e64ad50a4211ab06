use crate::auth::SignedIn;
use crate::error::{body, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use famtree_core::{core_version, Tree, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: core_version(),
    })
}

pub async fn me(signed_in: SignedIn) -> Json<User> {
    Json(signed_in.user)
}

pub async fn sync_user(
    State(state): State<AppState>,
    signed_in: SignedIn,
) -> ApiResult<Json<User>> {
    let user = state.with_stores(|stores| {
        stores
            .identities()
            .sync_profile(&signed_in.user, &signed_in.identity)
    })?;
    Ok(Json(user))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSessionResponse {
    pub guest_session_id: String,
}

pub async fn start_guest_session(State(state): State<AppState>) -> ApiResult<Json<GuestSessionResponse>> {
    let guest_session_id = state.with_stores(|stores| Ok(stores.guest_sessions().start_session()))?;
    Ok(Json(GuestSessionResponse { guest_session_id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub guest_session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub message: &'static str,
    pub tree: Tree,
}

pub async fn claim_guest_session(
    State(state): State<AppState>,
    signed_in: SignedIn,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> ApiResult<Json<ClaimResponse>> {
    let request = body(payload)?;
    let tree = state.with_stores(|stores| {
        stores
            .guest_sessions()
            .claim(&request.guest_session_id, signed_in.user.id)
    })?;
    Ok(Json(ClaimResponse {
        message: "guest tree claimed",
        tree,
    }))
}
