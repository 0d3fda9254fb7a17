//! External identity provider.
//!
//! [`HttpIdentityProvider`] speaks the GoTrue REST dialect:
//! `GET /auth/v1/user` resolves a bearer token and
//! `GET /auth/v1/admin/users` pages through every identity.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use storegate_core::models::identity::ExternalIdentity;
use tracing::debug;

use crate::error::IdentityError;

/// Authenticates end-user bearer tokens and enumerates identities.
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token. A rejected token is
    /// [`IdentityError::Unauthenticated`].
    fn authenticate(
        &self,
        bearer: &str,
    ) -> impl Future<Output = Result<ExternalIdentity, IdentityError>> + Send;

    /// One page of identities; `page` starts at 1. A page shorter than
    /// `per_page` is the last one.
    fn list_identities(
        &self,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<Vec<ExternalIdentity>, IdentityError>> + Send;
}

#[derive(Debug, Clone)]
pub struct IdentityProviderConfig {
    /// Base URL, e.g. `https://project.supabase.co`.
    pub url: String,
    /// Public key sent as `apikey` on end-user requests.
    pub anon_key: String,
    /// Privileged key for admin listing. Backfill is unavailable
    /// without it.
    pub service_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9999".into(),
            anon_key: String::new(),
            service_key: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

impl From<ProviderUser> for ExternalIdentity {
    fn from(user: ProviderUser) -> Self {
        let attributes = match user.user_metadata {
            Some(v @ serde_json::Value::Object(_)) => v,
            _ => serde_json::Value::Object(Default::default()),
        };
        ExternalIdentity {
            external_id: user.id,
            email: user.email.unwrap_or_default(),
            email_verified: user.email_confirmed_at.is_some(),
            created_at: user.created_at,
            attributes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<ProviderUser>,
}

#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    config: IdentityProviderConfig,
}

impl HttpIdentityProvider {
    pub fn new(config: IdentityProviderConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IdentityError::Unavailable(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.url.trim_end_matches('/'))
    }
}

impl IdentityProvider for HttpIdentityProvider {
    async fn authenticate(&self, bearer: &str) -> Result<ExternalIdentity, IdentityError> {
        let response = self
            .client
            .get(self.endpoint("/auth/v1/user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(IdentityError::Unauthenticated);
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                return Err(IdentityError::Unavailable(format!(
                    "user endpoint returned {s}: {body}"
                )));
            }
        }

        let user: ProviderUser = response
            .json()
            .await
            .map_err(|e| IdentityError::Malformed(e.to_string()))?;
        debug!(external_id = %user.id, "Bearer token resolved");
        Ok(user.into())
    }

    async fn list_identities(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ExternalIdentity>, IdentityError> {
        let service_key = self.config.service_key.as_deref().ok_or_else(|| {
            IdentityError::Unavailable("no service key configured for identity listing".into())
        })?;

        let response = self
            .client
            .get(self.endpoint("/auth/v1/admin/users"))
            .query(&[("page", page), ("per_page", per_page)])
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Unavailable(format!(
                "admin users endpoint returned {status}: {body}"
            )));
        }

        let page: UserPage = response
            .json()
            .await
            .map_err(|e| IdentityError::Malformed(e.to_string()))?;
        Ok(page.users.into_iter().map(ExternalIdentity::from).collect())
    }
}
