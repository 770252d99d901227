//! Password hashing and verification.
//!
//! Argon2id with a fresh salt on every hash, so two hashes of one password
//! never compare equal byte-for-byte; the salt and parameters travel inside
//! the PHC string. Verification is total: malformed input is just `false`.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version,
};

use crate::error::AuthError;

const DEFAULT_M_COST_KIB: u32 = 19_456;
const DEFAULT_T_COST: u32 = 2;
const DEFAULT_P_COST: u32 = 1;

/// Tunable Argon2id cost parameters.
///
/// Hashing is deliberately expensive; raise these as hardware improves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkFactor {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for WorkFactor {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_M_COST_KIB,
            iterations: DEFAULT_T_COST,
            parallelism: DEFAULT_P_COST,
        }
    }
}

impl WorkFactor {
    /// Cheap parameters for tests only; do not use in production.
    #[must_use]
    pub fn fast_insecure() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn hasher(self) -> Result<Argon2<'static>, AuthError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hashes a password into a PHC string with a freshly generated salt.
///
/// CPU-bound; callers on a request path should run this under
/// `tokio::task::spawn_blocking`.
///
/// # Errors
/// Returns an error if the cost parameters are rejected or hashing fails.
pub fn hash(plaintext: &str, work: WorkFactor) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = work
        .hasher()?
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hash failure: {e}"))?
        .to_string();
    Ok(phc)
}

/// Verifies a password against a stored PHC string.
///
/// Re-derives with the salt and parameters embedded in the string and lets
/// the argon2 crate do the constant-time comparison. Never errors: a
/// malformed or non-PHC `stored` value simply fails verification.
#[must_use]
pub fn verify(plaintext: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}
