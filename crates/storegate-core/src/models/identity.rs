//! External identity as reported by the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only snapshot of an end user owned by the external provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalIdentity {
    pub external_id: String,
    pub email: String,
    pub email_verified: bool,
    pub created_at: Option<DateTime<Utc>>,
    /// Free-form profile attributes (`full_name`, ...).
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl ExternalIdentity {
    /// `attributes.full_name`, when present and non-blank.
    pub fn full_name(&self) -> Option<&str> {
        self.attributes
            .get("full_name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
