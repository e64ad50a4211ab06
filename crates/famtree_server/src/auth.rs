//! Request caller resolution.
//!
//! # Responsibility
//! - Turn `Authorization: Bearer <id token>` into a local user.
//! - Fall back to the `x-guest-session-id` header when no usable token
//!   is presented.
//!
//! # Invariants
//! - A rejected bearer token without a guest header is `unauthenticated`.
//! - Token values are never logged.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use famtree_core::{FamilyError, Requester, User, VerifiedIdentity};
use log::debug;

pub const GUEST_SESSION_HEADER: &str = "x-guest-session-id";

/// Whoever is making the request.
#[derive(Debug, Clone)]
pub enum Caller {
    User {
        user: User,
        identity: VerifiedIdentity,
    },
    Guest(String),
}

impl Caller {
    pub fn requester(&self) -> Requester {
        match self {
            Self::User { user, .. } => Requester::User(user.id),
            Self::Guest(token) => Requester::Guest(token.clone()),
        }
    }
}

/// A caller that must be a registered user.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub identity: VerifiedIdentity,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn guest_session(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(GUEST_SESSION_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty()).then_some(value)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let guest = guest_session(&parts.headers);

        if let Some(token) = bearer_token(&parts.headers) {
            match state.verifier().verify(token) {
                Ok(identity) => {
                    let user =
                        state.with_stores(|stores| stores.identities().resolve_user(&identity))?;
                    return Ok(Self::User { user, identity });
                }
                Err(err) if guest.is_none() => return Err(err.into()),
                Err(_) => {
                    debug!("event=auth module=http status=fallback reason=guest_header");
                }
            }
        }

        match guest {
            Some(token) => Ok(Self::Guest(token.to_string())),
            None => Err(FamilyError::Unauthenticated(
                "sign in or start a guest session".to_string(),
            )
            .into()),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for SignedIn {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Caller::from_request_parts(parts, state).await? {
            Caller::User { user, identity } => Ok(Self { user, identity }),
            Caller::Guest(_) => Err(FamilyError::Unauthenticated(
                "this action requires a signed-in user".to_string(),
            )
            .into()),
        }
    }
}
