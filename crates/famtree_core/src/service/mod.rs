//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Own every cross-document rule; stores only guard single documents.
//! - Keep the HTTP and CLI layers decoupled from storage details.

pub mod access_guard;
pub mod audit;
pub mod guest_session_service;
pub mod identity_service;
pub mod relationship_service;
pub mod tree_service;
