//! Core domain logic for famtree.
//! This crate is the single source of truth for relationship-graph invariants.

pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::{FamilyError, FamilyResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::member::{
    Gender, Member, MemberId, MemberProfile, MemberRole, ParentSlot, SpouseLink,
};
pub use model::tree::{Privacy, Tree, TreeId, TreeOwner};
pub use model::user::{User, UserId};
pub use repo::member_repo::{MemberStore, SqliteMemberStore};
pub use repo::tree_repo::{SqliteTreeStore, TreeStore};
pub use repo::user_repo::{SqliteUserStore, UserStore};
pub use repo::{StoreError, StoreResult};
pub use service::access_guard::{AccessGuard, AccessMode, Requester};
pub use service::audit::{audit_stored_tree, audit_tree, AuditReport, Violation};
pub use service::guest_session_service::GuestSessionService;
pub use service::identity_service::{
    IdentityService, IdentityVerifier, StaticTokenVerifier, VerifiedIdentity,
};
pub use service::relationship_service::{
    DeleteSummary, MemberPatch, NewChild, NewMember, NewSpouse, RelationshipService,
};
pub use service::tree_service::{SeedMember, TreeDetails, TreePatch, TreeService, TreeView};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
