//! Session manager: admin login, validation, logout and rotation.

use chrono::{DateTime, Utc};
use storegate_core::error::GateError;
use storegate_core::models::activity::{
    ACTION_ADMIN_LOGIN, ACTION_ADMIN_LOGOUT, CreateActivityLogEntry, RESOURCE_ADMIN_SESSION,
};
use storegate_core::models::admin::{AdminView, CreateAdminPrincipal};
use storegate_core::models::session::{CreateAdminSession, ValidatedSession};
use storegate_core::repository::{AdminPrincipalRepository, AdminSessionRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::ActivityRecorder;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{self, IssuedTokens};

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Issued credentials. The raw tokens exist only here; the datastore
/// holds their digests.
#[derive(Debug)]
pub struct LoginOutput {
    pub session_token: String,
    pub refresh_token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub principal: AdminView,
}

/// Input for refresh token rotation.
#[derive(Debug)]
pub struct RefreshInput {
    pub refresh_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Admin session manager.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct SessionManager<P: AdminPrincipalRepository, S: AdminSessionRepository> {
    principals: P,
    sessions: S,
    recorder: ActivityRecorder,
    config: AuthConfig,
}

impl<P: AdminPrincipalRepository, S: AdminSessionRepository> SessionManager<P, S> {
    pub fn new(principals: P, sessions: S, recorder: ActivityRecorder, config: AuthConfig) -> Self {
        Self {
            principals,
            sessions,
            recorder,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate an admin by email and password and open a session.
    ///
    /// Unknown, inactive and wrong-password attempts all surface as
    /// [`AuthError::InvalidCredentials`] and all pay one Argon2
    /// verification. A locked account is rejected without looking at
    /// its stored hash.
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutput, AuthError> {
        let email = input.email.trim().to_lowercase();

        let principal = match self.principals.get_active_by_email(&email).await {
            Ok(p) => p,
            Err(GateError::NotFound { .. }) => {
                password::verify_decoy(&input.password, self.config.pepper.as_deref())?;
                info!(email = %email, "Admin login rejected: unknown or inactive principal");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        if principal.is_locked_at(now) {
            password::verify_decoy(&input.password, self.config.pepper.as_deref())?;
            warn!(principal_id = %principal.id, locked_until = ?principal.locked_until, "Admin login rejected: account locked");
            return Err(AuthError::AccountLocked);
        }

        let valid = password::verify_password(
            &input.password,
            &principal.password_hash,
            self.config.pepper.as_deref(),
        )?;

        if !valid {
            let updated = self
                .principals
                .record_failed_login(
                    principal.id,
                    self.config.max_failed_login_attempts,
                    now + self.config.lockout_duration(),
                )
                .await?;
            if updated.is_locked_at(now) {
                warn!(
                    principal_id = %updated.id,
                    failed_attempts = updated.failed_attempts,
                    locked_until = ?updated.locked_until,
                    "Admin account locked after repeated login failures"
                );
            } else {
                info!(principal_id = %updated.id, failed_attempts = updated.failed_attempts, "Admin login rejected: wrong password");
            }
            return Err(AuthError::InvalidCredentials);
        }

        // The counter is only reset once a session exists.
        let mut output = self
            .open_session(
                principal.view(),
                input.remember_me,
                input.ip_address.clone(),
                input.user_agent.clone(),
                now,
            )
            .await?;

        let principal = self
            .principals
            .record_successful_login(principal.id, now)
            .await?;
        output.principal = principal.view();

        self.recorder.record(
            CreateActivityLogEntry::new(Some(principal.id), ACTION_ADMIN_LOGIN, RESOURCE_ADMIN_SESSION)
                .with_resource_id(output.session_id.to_string())
                .with_details(serde_json::json!({ "remember_me": input.remember_me }))
                .with_client(input.ip_address, input.user_agent),
        );

        info!(principal_id = %principal.id, session_id = %output.session_id, remember_me = input.remember_me, "Admin logged in");
        Ok(output)
    }

    /// Resolve a presented session token to its principal.
    pub async fn validate(&self, session_token: &str) -> Result<ValidatedSession, AuthError> {
        self.validate_at(session_token, Utc::now()).await
    }

    /// [`validate`](Self::validate) against an explicit clock.
    pub async fn validate_at(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidatedSession, AuthError> {
        if session_token.is_empty() {
            return Err(AuthError::InvalidOrExpiredSession);
        }
        self.sessions
            .validate(&token::hash_token(session_token), now)
            .await
            .map_err(|e| match e {
                GateError::NotFound { .. } => AuthError::InvalidOrExpiredSession,
                other => other.into(),
            })
    }

    /// End a session. Unknown, expired or already revoked tokens are
    /// not an error.
    pub async fn logout(
        &self,
        session_token: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), AuthError> {
        if session_token.is_empty() {
            return Ok(());
        }

        // Only used to attribute the audit entry.
        let holder = self.validate(session_token).await.ok();

        self.sessions
            .deactivate_by_token(&token::hash_token(session_token))
            .await?;

        if let Some(session) = holder {
            self.recorder.record(
                CreateActivityLogEntry::new(
                    Some(session.principal.id),
                    ACTION_ADMIN_LOGOUT,
                    RESOURCE_ADMIN_SESSION,
                )
                .with_resource_id(session.session_id.to_string())
                .with_client(ip_address, user_agent),
            );
            info!(principal_id = %session.principal.id, session_id = %session.session_id, "Admin logged out");
        }
        Ok(())
    }

    /// Revoke every active session of a principal.
    pub async fn revoke_all_for_principal(&self, principal_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self.sessions.deactivate_for_principal(principal_id).await?;
        info!(principal_id = %principal_id, revoked, "Admin sessions revoked");
        Ok(revoked)
    }

    /// Exchange a refresh token for a new session.
    ///
    /// Each refresh token is single-use: the old session is consumed by
    /// one conditional update, so of two concurrent exchanges at most
    /// one succeeds.
    pub async fn refresh(&self, input: RefreshInput) -> Result<LoginOutput, AuthError> {
        if input.refresh_token.is_empty() {
            return Err(AuthError::InvalidOrExpiredSession);
        }
        let now = Utc::now();
        let consumed = self
            .sessions
            .consume_refresh(&token::hash_token(&input.refresh_token), now)
            .await
            .map_err(|e| match e {
                GateError::NotFound { .. } => AuthError::InvalidOrExpiredSession,
                other => other.into(),
            })?;

        let principal = match self.principals.get_by_id(consumed.principal_id).await {
            Ok(p) if p.is_active => p,
            Ok(_) | Err(GateError::NotFound { .. }) => {
                return Err(AuthError::InvalidOrExpiredSession);
            }
            Err(e) => return Err(e.into()),
        };

        let output = self
            .open_session(
                principal.view(),
                consumed.is_remember_me,
                input.ip_address,
                input.user_agent,
                now,
            )
            .await?;

        info!(
            principal_id = %principal.id,
            old_session_id = %consumed.id,
            session_id = %output.session_id,
            "Admin session rotated"
        );
        Ok(output)
    }

    /// Deactivate every session whose expiry has passed.
    pub async fn sweep_expired(&self) -> Result<u64, AuthError> {
        let swept = self.sessions.deactivate_expired(Utc::now()).await?;
        if swept > 0 {
            info!(swept, "Expired admin sessions deactivated");
        }
        Ok(swept)
    }

    pub async fn count_active_sessions(&self) -> Result<u64, AuthError> {
        Ok(self.sessions.count_active(Utc::now()).await?)
    }

    /// Soft-deactivate a principal and revoke its sessions.
    pub async fn deactivate_principal(&self, principal_id: Uuid) -> Result<AdminView, AuthError> {
        let principal = self.principals.set_active(principal_id, false).await?;
        let revoked = self.sessions.deactivate_for_principal(principal_id).await?;
        info!(principal_id = %principal_id, revoked, "Admin principal deactivated");
        Ok(principal.view())
    }

    /// Create a new admin principal.
    pub async fn provision_admin(&self, input: CreateAdminPrincipal) -> Result<AdminView, AuthError> {
        let email = input.email.trim();
        if !looks_like_email(email) {
            return Err(AuthError::Validation(format!("invalid email address: {email:?}")));
        }
        password::check_policy(&input.password, self.config.min_password_length)?;

        let principal = self.principals.create(input).await?;
        Ok(principal.view())
    }

    async fn open_session(
        &self,
        principal: AdminView,
        remember_me: bool,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LoginOutput, AuthError> {
        let tokens = IssuedTokens::generate();
        let expires_at = now + self.config.session_lifetime(remember_me);

        let session = self
            .sessions
            .create(CreateAdminSession {
                principal_id: principal.id,
                token_hash: tokens.session_hash,
                refresh_token_hash: tokens.refresh_hash,
                expires_at,
                is_remember_me: remember_me,
                ip_address,
                user_agent,
            })
            .await?;

        Ok(LoginOutput {
            session_token: tokens.session_token,
            refresh_token: tokens.refresh_token,
            session_id: session.id,
            expires_at: session.expires_at,
            principal,
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::looks_like_email;

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("ops@shop.example"));
        assert!(!looks_like_email("ops"));
        assert!(!looks_like_email("@shop.example"));
        assert!(!looks_like_email("ops@localhost"));
        assert!(!looks_like_email("o ps@shop.example"));
    }
}
