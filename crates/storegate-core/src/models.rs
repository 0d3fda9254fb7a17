//! Domain models for storegate.
//!
//! These are the typed records shared across all crates, one module per
//! persisted entity plus the read-only external identity.

pub mod activity;
pub mod admin;
pub mod identity;
pub mod local_user;
pub mod session;
pub mod sync_log;
