//! Use-case error taxonomy shared by every service.
//!
//! # Responsibility
//! - Classify failures the way callers react to them (bad input, missing
//!   document, refused access, wrong graph state, store failure).
//! - Expose a stable `code()` string for log lines and error bodies.

use crate::model::member::MemberValidationError;
use crate::model::tree::TreeValidationError;
use crate::repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type FamilyResult<T> = Result<T, FamilyError>;

#[derive(Debug)]
pub enum FamilyError {
    /// Caller input is malformed or incomplete.
    InvalidArgument(String),
    /// Referenced tree, member, user, or guest session does not exist.
    NotFound(String),
    /// Requester may not access the tree.
    Denied(String),
    /// Graph state does not allow the operation.
    InvalidState(String),
    /// No verifiable identity was presented.
    Unauthenticated(String),
    /// Store failure.
    Internal(StoreError),
}

impl FamilyError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Denied(_) => "denied",
            Self::InvalidState(_) => "invalid_state",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn member_not_found(member_id: impl Display) -> Self {
        Self::NotFound(format!("member not found: {member_id}"))
    }
}

impl Display for FamilyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message)
            | Self::NotFound(message)
            | Self::Denied(message)
            | Self::InvalidState(message)
            | Self::Unauthenticated(message) => write!(f, "{message}"),
            Self::Internal(err) => write!(f, "store failure: {err}"),
        }
    }
}

impl Error for FamilyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Internal(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for FamilyError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { collection, id } => {
                Self::NotFound(format!("{collection} document not found: {id}"))
            }
            StoreError::InvalidMember(err) => Self::from(err),
            StoreError::InvalidTree(err) => Self::from(err),
            other => Self::Internal(other),
        }
    }
}

impl From<MemberValidationError> for FamilyError {
    fn from(value: MemberValidationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

impl From<TreeValidationError> for FamilyError {
    fn from(value: TreeValidationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::FamilyError;
    use crate::db::DbError;
    use crate::model::member::{MemberValidationError, ParentSlot};
    use crate::repo::StoreError;
    use uuid::Uuid;

    #[test]
    fn store_errors_map_to_caller_facing_kinds() {
        let id = Uuid::new_v4();
        let err = FamilyError::from(StoreError::NotFound {
            collection: "members",
            id,
        });
        assert_eq!(err.code(), "not_found");
        assert!(err.to_string().contains(&id.to_string()));

        let err = FamilyError::from(StoreError::InvalidMember(
            MemberValidationError::MissingParent(ParentSlot::Father),
        ));
        assert_eq!(err.code(), "invalid_argument");

        let err = FamilyError::from(StoreError::Db(DbError::UnsupportedSchemaVersion {
            db_version: 9,
            latest_supported: 2,
        }));
        assert_eq!(err.code(), "internal");
    }
}
