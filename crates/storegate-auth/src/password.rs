//! Admin password checks: Argon2id verification and the provisioning policy.

use std::borrow::Cow;

use argon2::password_hash::{Error as HashError, PasswordHash};
use argon2::{Argon2, PasswordVerifier};

use crate::error::AuthError;

/// The bytes actually fed to Argon2: `pepper || password`.
fn secret_bytes<'a>(password: &'a str, pepper: Option<&str>) -> Cow<'a, [u8]> {
    match pepper {
        Some(p) => Cow::Owned(format!("{p}{password}").into_bytes()),
        None => Cow::Borrowed(password.as_bytes()),
    }
}

/// Check a login password against a stored PHC string.
///
/// The hash carries its own parameters and salt. `pepper` must be the one the
/// credential store hashed with. A mismatch is `Ok(false)`; only an
/// unreadable hash is an error.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let stored = PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("stored hash unreadable: {e}")))?;

    match Argon2::default().verify_password(&secret_bytes(password, pepper), &stored) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// A well-formed Argon2id hash that no password matches, carrying the
/// credential store's parameters (m=19456, t=2, p=1).
pub const DECOY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c3RvcmVnYXRlLWRlY295IQ$ol5SigTFcKPg4fv+ECpvmItvL9vC/KvGgIMc2NQE1Vo";

/// Spend the same Argon2 work as [`verify_password`] when there is no
/// stored hash to check against. Always `Ok(false)`.
pub fn verify_decoy(password: &str, pepper: Option<&str>) -> Result<bool, AuthError> {
    verify_password(password, DECOY_HASH, pepper)?;
    Ok(false)
}

/// Minimum bar for a newly provisioned admin password.
pub fn check_policy(password: &str, min_length: usize) -> Result<(), AuthError> {
    if password.trim().is_empty() {
        return Err(AuthError::Validation("password must not be blank".into()));
    }
    if password.chars().count() < min_length {
        return Err(AuthError::Validation(format!(
            "password must be at least {min_length} characters"
        )));
    }
    Ok(())
}
