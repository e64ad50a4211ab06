//! Shared server state and per-request service wiring.
//!
//! # Responsibility
//! - Own the single SQLite connection and the identity verifier.
//! - Build store-backed services for one request at a time.
//!
//! # Invariants
//! - The connection lock is held only inside synchronous closures,
//!   never across an `.await`.
//! - Stores are constructed through `try_new`, so an unmigrated
//!   connection surfaces as an internal error instead of a panic.

use famtree_core::{
    AccessGuard, FamilyResult, GuestSessionService, IdentityService, IdentityVerifier,
    RelationshipService, SqliteMemberStore, SqliteTreeStore, SqliteUserStore, TreeService,
};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(conn: Connection, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            verifier,
        }
    }

    pub fn verifier(&self) -> &dyn IdentityVerifier {
        self.verifier.as_ref()
    }

    /// Runs `f` with the three document stores bound to the shared connection.
    pub fn with_stores<R>(&self, f: impl FnOnce(&Stores<'_>) -> FamilyResult<R>) -> FamilyResult<R> {
        let conn = self.db.lock();
        let stores = Stores::open(&conn)?;
        f(&stores)
    }
}

/// Document stores over one borrowed connection.
#[derive(Clone, Copy)]
pub struct Stores<'conn> {
    pub members: SqliteMemberStore<'conn>,
    pub trees: SqliteTreeStore<'conn>,
    pub users: SqliteUserStore<'conn>,
}

impl<'conn> Stores<'conn> {
    fn open(conn: &'conn Connection) -> FamilyResult<Self> {
        Ok(Self {
            members: SqliteMemberStore::try_new(conn)?,
            trees: SqliteTreeStore::try_new(conn)?,
            users: SqliteUserStore::try_new(conn)?,
        })
    }

    pub fn guard(&self) -> AccessGuard<SqliteTreeStore<'conn>> {
        AccessGuard::new(self.trees)
    }

    pub fn relationships(
        &self,
    ) -> RelationshipService<SqliteMemberStore<'conn>, SqliteTreeStore<'conn>> {
        RelationshipService::new(self.members, self.trees)
    }

    pub fn tree_service(
        &self,
    ) -> TreeService<SqliteMemberStore<'conn>, SqliteTreeStore<'conn>, SqliteUserStore<'conn>> {
        TreeService::new(self.members, self.trees, self.users)
    }

    pub fn guest_sessions(
        &self,
    ) -> GuestSessionService<SqliteTreeStore<'conn>, SqliteUserStore<'conn>> {
        GuestSessionService::new(self.trees, self.users)
    }

    pub fn identities(&self) -> IdentityService<SqliteUserStore<'conn>> {
        IdentityService::new(self.users)
    }
}
