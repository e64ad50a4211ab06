//! HTTP surface for the famtree core.
//!
//! # Responsibility
//! - Map REST routes onto core use-cases.
//! - Resolve the caller from bearer id tokens or guest session headers.
//! - Translate use-case errors into `{code, message}` JSON bodies.
//!
//! # Invariants
//! - Routes never write member edges directly; the relationship mutator
//!   is the only writer.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use auth::{Caller, SignedIn, GUEST_SESSION_HEADER};
pub use error::{ApiError, ApiResult, ErrorBody};
pub use routes::router;
pub use state::AppState;
