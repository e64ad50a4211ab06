//! Family tree domain model.
//!
//! # Responsibility
//! - Define the tree document: metadata, owner, and member id list.
//!
//! # Invariants
//! - A tree is owned by exactly one of: a registered user, a guest session.
//! - `members` keeps insertion order and never holds duplicates.

use crate::model::member::MemberId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable tree identifier.
pub type TreeId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    #[default]
    Private,
    PublicLink,
    Public,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicLink => "public_link",
            Self::Public => "public",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Self::Private),
            "public_link" => Some(Self::PublicLink),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// Who may read and write a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TreeOwner {
    /// Registered user; the tree has been created or claimed by them.
    User(UserId),
    /// Unclaimed tree created under a guest session token.
    Guest(String),
}

impl TreeOwner {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }

    pub fn guest_session_id(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::Guest(token) => Some(token.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    BlankName,
    BlankGuestSession,
}

impl Display for TreeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "family tree name is required"),
            Self::BlankGuestSession => write!(f, "guest session id must not be blank"),
        }
    }
}

impl Error for TreeValidationError {}

/// A family tree document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    pub id: TreeId,
    pub name: String,
    pub description: Option<String>,
    pub privacy: Privacy,
    pub shareable_link: Option<String>,
    pub owner: TreeOwner,
    pub members: Vec<MemberId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Tree {
    /// Creates an empty private tree with a fresh id.
    ///
    /// Name and description are trimmed; a blank description becomes `None`.
    pub fn new(name: impl Into<String>, description: Option<String>, owner: TreeOwner) -> Self {
        let now = crate::model::now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            description: normalize_description(description),
            privacy: Privacy::Private,
            shareable_link: None,
            owner,
            members: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn contains_member(&self, member_id: MemberId) -> bool {
        self.members.contains(&member_id)
    }

    pub fn validate(&self) -> Result<(), TreeValidationError> {
        if self.name.trim().is_empty() {
            return Err(TreeValidationError::BlankName);
        }
        if let TreeOwner::Guest(token) = &self.owner {
            if token.trim().is_empty() {
                return Err(TreeValidationError::BlankGuestSession);
            }
        }
        Ok(())
    }
}

/// Trims a description and maps blank input to `None`.
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
