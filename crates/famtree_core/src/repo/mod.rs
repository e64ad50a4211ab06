//! Document-store contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define per-collection store traits (`MemberStore`, `TreeStore`,
//!   `UserStore`) with document-store semantics.
//! - Isolate SQLite details from the relationship and tree services.
//!
//! # Invariants
//! - Every write touches exactly one document; nothing spans two documents.
//! - Set updates (`add_*`/`remove_*`/`pull_*`) are idempotent and report
//!   whether the document changed.
//! - Write paths validate the record before persisting it.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod error;
pub mod member_repo;
mod support;
pub mod tree_repo;
pub mod user_repo;

pub use error::{StoreError, StoreResult};
