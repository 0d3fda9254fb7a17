//! Server configuration loaded from `STOREGATE_*` environment variables.

use std::env;

use storegate_auth::audit::DEFAULT_QUEUE_CAPACITY;
use storegate_auth::{AuthConfig, IdentityProviderConfig};
use storegate_core::models::admin::AdminRole;
use storegate_db::DbConfig;

pub const DEFAULT_COOKIE_NAME: &str = "storegate_admin_session";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Name of the admin session cookie.
    pub cookie_name: String,
    /// Mark the session cookie `Secure`.
    pub cookie_secure: bool,
    /// Interval between expired-session sweeps, in seconds. `0` disables
    /// sweeping.
    pub sweep_interval_secs: u64,
    pub activity_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            cookie_name: DEFAULT_COOKIE_NAME.into(),
            cookie_secure: true,
            sweep_interval_secs: 300,
            activity_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Admin account created at startup when none with that email exists.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub role: AdminRole,
}

/// Everything the binary needs to start.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub db: DbConfig,
    pub auth: AuthConfig,
    pub identity: IdentityProviderConfig,
    pub server: ServerConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Settings {
    pub fn from_env() -> Self {
        let db_defaults = DbConfig::default();
        let auth_defaults = AuthConfig::default();
        let identity_defaults = IdentityProviderConfig::default();
        let server_defaults = ServerConfig::default();

        let db = DbConfig {
            url: env_string("STOREGATE_DB_URL", &db_defaults.url),
            namespace: env_string("STOREGATE_DB_NAMESPACE", &db_defaults.namespace),
            database: env_string("STOREGATE_DB_DATABASE", &db_defaults.database),
            username: env_string("STOREGATE_DB_USERNAME", &db_defaults.username),
            password: env_string("STOREGATE_DB_PASSWORD", &db_defaults.password),
        };

        let auth = AuthConfig {
            pepper: env_opt("STOREGATE_PASSWORD_PEPPER"),
            session_lifetime_secs: env_u64(
                "STOREGATE_SESSION_TTL_SECS",
                auth_defaults.session_lifetime_secs,
            ),
            remember_me_lifetime_secs: env_u64(
                "STOREGATE_REMEMBER_ME_TTL_SECS",
                auth_defaults.remember_me_lifetime_secs,
            ),
            max_failed_login_attempts: env_u64(
                "STOREGATE_LOCKOUT_THRESHOLD",
                u64::from(auth_defaults.max_failed_login_attempts),
            )
            .clamp(1, u64::from(u32::MAX)) as u32,
            lockout_duration_secs: env_u64(
                "STOREGATE_LOCKOUT_WINDOW_SECS",
                auth_defaults.lockout_duration_secs,
            ),
            min_password_length: env_usize(
                "STOREGATE_MIN_PASSWORD_LENGTH",
                auth_defaults.min_password_length,
            ),
        };

        let identity = IdentityProviderConfig {
            url: env_string("STOREGATE_IDENTITY_URL", &identity_defaults.url),
            anon_key: env_string("STOREGATE_IDENTITY_ANON_KEY", &identity_defaults.anon_key),
            service_key: env_opt("STOREGATE_IDENTITY_SERVICE_KEY"),
            timeout_secs: env_u64(
                "STOREGATE_IDENTITY_TIMEOUT_SECS",
                identity_defaults.timeout_secs,
            ),
        };

        let server = ServerConfig {
            bind_addr: env_string("STOREGATE_BIND_ADDR", &server_defaults.bind_addr),
            cookie_name: env_string("STOREGATE_COOKIE_NAME", &server_defaults.cookie_name),
            cookie_secure: env_bool("STOREGATE_COOKIE_SECURE", server_defaults.cookie_secure),
            sweep_interval_secs: env_u64(
                "STOREGATE_SWEEP_INTERVAL_SECS",
                server_defaults.sweep_interval_secs,
            ),
            activity_queue_capacity: env_usize(
                "STOREGATE_ACTIVITY_QUEUE_CAPACITY",
                server_defaults.activity_queue_capacity,
            ),
        };

        let bootstrap_admin = match (
            env_opt("STOREGATE_BOOTSTRAP_ADMIN_EMAIL"),
            env_opt("STOREGATE_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                role: env_opt("STOREGATE_BOOTSTRAP_ADMIN_ROLE")
                    .and_then(|r| AdminRole::parse(&r))
                    .unwrap_or(AdminRole::SuperAdmin),
            }),
            _ => None,
        };

        Self {
            db,
            auth,
            identity,
            server,
            bootstrap_admin,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_string(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
