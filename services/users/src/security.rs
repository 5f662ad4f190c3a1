//! Security contracts: the principal view consumed by the authentication
//! layer and the password encoder seam.

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};

use crate::models::User;

/// The identity object the authentication layer works with: login name,
/// password hash, granted authorities, and account-status flags.
///
/// This model carries no account-state machine, so every status flag
/// defaults to `true`.
pub trait Principal {
    fn username(&self) -> &str;

    fn password(&self) -> &str;

    fn authorities(&self) -> Vec<String>;

    fn is_account_non_expired(&self) -> bool {
        true
    }

    fn is_account_non_locked(&self) -> bool {
        true
    }

    fn is_credentials_non_expired(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

impl Principal for User {
    /// The email doubles as the login name
    fn username(&self) -> &str {
        &self.email
    }

    fn password(&self) -> &str {
        &self.password
    }

    fn authorities(&self) -> Vec<String> {
        User::authorities(self)
    }
}

/// One-way, salted password hashing
pub trait PasswordEncoder: Send + Sync {
    /// Hash a plain-text password for storage
    fn encode(&self, raw: &str) -> Result<String>;

    /// Check a plain-text password against a stored hash
    fn verify(&self, raw: &str, hash: &str) -> Result<bool>;
}

/// Argon2 password encoder
#[derive(Clone, Default)]
pub struct Argon2PasswordEncoder;

impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, raw: &str) -> Result<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, raw: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

        let argon2 = Argon2::default();
        Ok(argon2.verify_password(raw.as_bytes(), &parsed_hash).is_ok())
    }
}
