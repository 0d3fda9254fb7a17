//! Admin principal domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdminRole {
    SuperAdmin,
    Admin,
    Editor,
    Viewer,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "SuperAdmin",
            AdminRole::Admin => "Admin",
            AdminRole::Editor => "Editor",
            AdminRole::Viewer => "Viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SuperAdmin" => Some(AdminRole::SuperAdmin),
            "Admin" => Some(AdminRole::Admin),
            "Editor" => Some(AdminRole::Editor),
            "Viewer" => Some(AdminRole::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminPrincipal {
    pub id: Uuid,
    /// Lower-cased, unique.
    pub email: String,
    pub password_hash: String,
    pub role: AdminRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminPrincipal {
    /// Whether a lockout is in force at `now`.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    pub fn view(&self) -> AdminView {
        AdminView {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            last_login_at: self.last_login_at,
        }
    }
}

/// Sanitized principal returned to clients and attached to requests.
/// Never carries the password hash or lockout state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub id: Uuid,
    pub email: String,
    pub role: AdminRole,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateAdminPrincipal {
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub role: AdminRole,
}
