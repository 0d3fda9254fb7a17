//! Request middleware: admin session guard and end-user resolution.

pub mod admin;
pub mod client;
pub mod user;

pub use admin::{AdminContext, require_admin};
pub use client::ClientInfo;
pub use user::{Principal, RequestContext, RequestSyncAction, resolve_user};
