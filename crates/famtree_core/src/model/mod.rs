//! Family-tree domain model.
//!
//! # Responsibility
//! - Define the documents persisted by the store: users, trees, members.
//! - Own record-local validation (`validate()`), never cross-document checks.
//!
//! # Invariants
//! - Every document is identified by a stable v4 UUID.
//! - Relationship edges are plain ids into the member collection.

pub mod member;
pub mod tree;
pub mod user;

/// Current wall-clock time as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
