//! Local user record for an externally verified identity.

use crate::model::tree::TreeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable local user identifier.
pub type UserId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Subject id issued by the identity provider. Unique.
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    /// Trees owned by this user, in the order they were acquired.
    pub family_trees: Vec<TreeId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(subject: impl Into<String>) -> Self {
        let now = crate::model::now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            email: None,
            display_name: None,
            profile_picture: None,
            family_trees: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owns_tree(&self, tree_id: TreeId) -> bool {
        self.family_trees.contains(&tree_id)
    }
}
