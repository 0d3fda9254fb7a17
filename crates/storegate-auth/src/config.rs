//! Authentication configuration.

/// Configuration for admin sessions and login lockout.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Optional pepper prepended to passwords before Argon2id
    /// hashing and verification.
    pub pepper: Option<String>,
    /// Session lifetime in seconds (default: 86_400 = 24 hours).
    pub session_lifetime_secs: u64,
    /// Session lifetime with "remember me" in seconds
    /// (default: 2_592_000 = 30 days).
    pub remember_me_lifetime_secs: u64,
    /// Consecutive failed logins that trigger a lockout (default: 5).
    pub max_failed_login_attempts: u32,
    /// Lockout duration in seconds (default: 900 = 15 min).
    pub lockout_duration_secs: u64,
    /// Minimum password length for provisioning (default: 12).
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pepper: None,
            session_lifetime_secs: 86_400,
            remember_me_lifetime_secs: 2_592_000,
            max_failed_login_attempts: 5,
            lockout_duration_secs: 900,
            min_password_length: 12,
        }
    }
}

impl AuthConfig {
    pub fn session_lifetime(&self, remember_me: bool) -> chrono::Duration {
        let secs = if remember_me {
            self.remember_me_lifetime_secs
        } else {
            self.session_lifetime_secs
        };
        chrono::Duration::seconds(secs as i64)
    }

    pub fn lockout_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lockout_duration_secs as i64)
    }
}
