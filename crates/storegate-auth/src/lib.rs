//! Storegate Auth: admin sessions, identity synchronization, activity
//! recording and the audited data gateway.

pub mod audit;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod password;
pub mod service;
pub mod sync;
pub mod token;

pub use audit::{ActivityRecorder, RecorderStats};
pub use config::AuthConfig;
pub use error::{AuthError, IdentityError, SyncError};
pub use gateway::{Actor, AuditedGateway};
pub use identity::{HttpIdentityProvider, IdentityProvider, IdentityProviderConfig};
pub use service::{LoginInput, LoginOutput, RefreshInput, SessionManager};
pub use sync::{SyncAction, SyncEngine, SyncOutcome, SyncReport, SyncStats};
