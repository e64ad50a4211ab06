//! Identity verification seam and local user resolution.
//!
//! # Responsibility
//! - Define the `IdentityVerifier` seam to an external token issuer.
//! - Map a verified identity to a local `User`, creating it on first sight.
//!
//! # Invariants
//! - One local user per verified subject.
//! - Tokens and profile fields are never logged.

use crate::error::{FamilyError, FamilyResult};
use crate::model::user::User;
use crate::repo::user_repo::UserStore;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Claims extracted from a verified id token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl VerifiedIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            display_name: None,
            picture: None,
        }
    }
}

/// Verifies bearer id tokens issued by an external identity provider.
pub trait IdentityVerifier: Send + Sync {
    /// Returns the identity behind `id_token`, or `Unauthenticated`.
    fn verify(&self, id_token: &str) -> FamilyResult<VerifiedIdentity>;
}

/// Fixed token table, for development servers and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, VerifiedIdentity>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, VerifiedIdentity>) -> Self {
        Self { tokens }
    }

    /// Parses a JSON object mapping token strings to identities.
    pub fn from_json(text: &str) -> Result<Self, String> {
        let tokens: HashMap<String, VerifiedIdentity> = serde_json::from_str(text)
            .map_err(|err| format!("invalid identity token table: {err}"))?;
        Ok(Self::new(tokens))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            format!(
                "failed to read identity token table `{}`: {err}",
                path.display()
            )
        })?;
        Self::from_json(&text)
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: VerifiedIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify(&self, id_token: &str) -> FamilyResult<VerifiedIdentity> {
        self.tokens
            .get(id_token.trim())
            .cloned()
            .ok_or_else(|| FamilyError::Unauthenticated("invalid or expired token".to_string()))
    }
}

pub struct IdentityService<U: UserStore> {
    users: U,
}

impl<U: UserStore> IdentityService<U> {
    pub fn new(users: U) -> Self {
        Self { users }
    }

    /// Finds the local user for `identity`, creating it on first sight.
    pub fn resolve_user(&self, identity: &VerifiedIdentity) -> FamilyResult<User> {
        if identity.subject.trim().is_empty() {
            return Err(FamilyError::Unauthenticated(
                "verified identity has no subject".to_string(),
            ));
        }
        if let Some(user) = self.users.find_by_subject(&identity.subject)? {
            return Ok(user);
        }

        let mut user = User::new(identity.subject.clone());
        user.email = identity.email.clone();
        user.display_name = identity.display_name.clone();
        user.profile_picture = identity.picture.clone();

        match self.users.insert_user(&user) {
            Ok(()) => {}
            Err(err) if err.is_unique_violation() => {
                // A concurrent first request inserted the same subject.
                warn!("event=user_create module=identity status=retry reason=duplicate_subject");
                return self
                    .users
                    .find_by_subject(&identity.subject)?
                    .ok_or_else(|| FamilyError::Internal(err));
            }
            Err(err) => return Err(err.into()),
        }

        info!("event=user_create module=identity status=ok user_id={}", user.id);
        Ok(user)
    }

    /// Refreshes email, display name, and picture from newer identity claims.
    ///
    /// Claims the verifier does not report leave the stored value untouched.
    pub fn sync_profile(&self, user: &User, identity: &VerifiedIdentity) -> FamilyResult<User> {
        let mut updated = user.clone();
        let mut changed = false;
        for (field, claim) in [
            (&mut updated.email, &identity.email),
            (&mut updated.display_name, &identity.display_name),
            (&mut updated.profile_picture, &identity.picture),
        ] {
            if claim.is_some() && *field != *claim {
                field.clone_from(claim);
                changed = true;
            }
        }

        if changed {
            self.users.update_profile(&updated)?;
            info!("event=user_sync module=identity status=ok user_id={}", user.id);
        }
        Ok(self.users.get_user(user.id)?.unwrap_or(updated))
    }
}
