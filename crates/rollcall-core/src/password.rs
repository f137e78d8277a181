//! Password hashing with Argon2id
//!
//! Passwords are never stored. Each one is hashed with a fresh random salt
//! and kept as a PHC string, which carries the algorithm, cost parameters and
//! salt, so verification works even after the configured cost changes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Default minimum password length
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

/// Hashing cost and strength rules for passwords
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Argon2 memory cost in KiB
    pub memory_kib: u32,
    /// Argon2 iteration count
    pub iterations: u32,
    /// Argon2 lanes
    pub parallelism: u32,
    /// Minimum accepted password length in characters
    pub min_length: usize,
    /// Optional server-side secret prepended to every password
    pub pepper: Option<String>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        // OWASP recommended: m=19456 (19 MiB), t=2, p=1
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
            min_length: DEFAULT_MIN_PASSWORD_LENGTH,
            pepper: None,
        }
    }
}

impl std::fmt::Debug for PasswordPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordPolicy")
            .field("memory_kib", &self.memory_kib)
            .field("iterations", &self.iterations)
            .field("parallelism", &self.parallelism)
            .field("min_length", &self.min_length)
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PasswordPolicy {
    /// Minimal Argon2 cost. Only for tests and throwaway stores.
    pub fn testing() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
            ..Default::default()
        }
    }

    /// Reject passwords that do not meet the strength rules.
    pub fn check(&self, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(Error::InvalidInput("password is required".into()));
        }
        if password.chars().count() < self.min_length {
            return Err(Error::InvalidInput(format!(
                "password must be at least {} characters",
                self.min_length
            )));
        }
        Ok(())
    }

    /// Hash a password into a PHC string with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let input = self.peppered(password);
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()?
            .hash_password(&input, &salt)
            .map_err(|e| Error::Crypto(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a stored PHC string in constant time.
    ///
    /// Returns `Ok(false)` on mismatch and `Err(Error::Crypto)` when the
    /// stored hash cannot be parsed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| Error::Crypto(format!("Invalid stored hash: {}", e)))?;

        let input = self.peppered(password);
        match Argon2::default().verify_password(&input, &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Crypto(format!("Verify error: {}", e))),
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| Error::Crypto(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn peppered(&self, password: &str) -> Zeroizing<Vec<u8>> {
        let mut input = Zeroizing::new(Vec::with_capacity(
            password.len() + self.pepper.as_ref().map_or(0, String::len),
        ));
        if let Some(pepper) = &self.pepper {
            input.extend_from_slice(pepper.as_bytes());
        }
        input.extend_from_slice(password.as_bytes());
        input
    }
}

/// Whether `hash` is a well-formed PHC string.
pub fn is_phc_hash(hash: &str) -> bool {
    PasswordHash::new(hash).is_ok()
}
