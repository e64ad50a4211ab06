//! Store-level error type shared by all collections.

use crate::db::DbError;
use crate::model::member::MemberValidationError;
use crate::model::tree::TreeValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Member record failed validation before write.
    InvalidMember(MemberValidationError),
    /// Tree record failed validation before write.
    InvalidTree(TreeValidationError),
    /// Targeted document does not exist.
    NotFound {
        collection: &'static str,
        id: Uuid,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid document.
    InvalidData(String),
}

impl StoreError {
    /// Whether the write hit a UNIQUE constraint, e.g. a duplicate user subject.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidMember(err) => write!(f, "{err}"),
            Self::InvalidTree(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => write!(f, "{collection} document not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "store requires table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "store requires column `{column}` in table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidMember(err) => Some(err),
            Self::InvalidTree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<MemberValidationError> for StoreError {
    fn from(value: MemberValidationError) -> Self {
        Self::InvalidMember(value)
    }
}

impl From<TreeValidationError> for StoreError {
    fn from(value: TreeValidationError) -> Self {
        Self::InvalidTree(value)
    }
}
