//! Password hashing for account registration and login.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
        rand_core::OsRng,
    },
};
use thiserror::Error;

use crate::infrastructure::config::AuthConfig;

#[derive(Error, Debug)]
pub enum PasswordHashError {
    #[error("invalid hashing parameters: {0}")]
    Parameters(String),

    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("stored password hash is unreadable: {0}")]
    MalformedHash(String),
}

/// Turns passwords into storable hashes and checks candidates against them.
///
/// Both operations are CPU bound; async callers should run them on a
/// blocking thread.
pub trait PasswordHashing: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError>;

    /// `Ok(false)` for a wrong password; `Err` only when `hash` cannot be read.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordHashError>;
}

/// Argon2id hashes in PHC format
#[derive(Clone, Debug)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Argon2PasswordHasher {
    /// # Errors
    /// Returns an error if the cost parameters are outside Argon2's limits
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PasswordHashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordHashError::Parameters(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, PasswordHashError> {
        Self::new(config.password_memory_kib, config.password_iterations, config.password_parallelism)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHashing for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordHashError::Hashing(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordHashError> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| PasswordHashError::MalformedHash(e.to_string()))?;

        // Cost parameters are read back from the stored hash.
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordHashError::MalformedHash(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_ok};

    fn hasher() -> Argon2PasswordHasher {
        Argon2PasswordHasher::new(8, 1, 1).unwrap()
    }

    #[test]
    fn hashes_are_salted_argon2id() {
        let first = assert_ok!(hasher().hash("CorrectHorse9"));
        let second = assert_ok!(hasher().hash("CorrectHorse9"));

        assert!(first.starts_with("$argon2id$v=19$m=8,t=1,p=1$"));
        assert_ne!(first, second);
    }

    #[test]
    fn verification_distinguishes_wrong_passwords() {
        let hash = hasher().hash("CorrectHorse9").unwrap();

        assert!(hasher().verify("CorrectHorse9", &hash).unwrap());
        assert!(!hasher().verify("correcthorse9", &hash).unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert_err!(hasher().verify("anything", "not-a-phc-string"));
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        assert_err!(Argon2PasswordHasher::new(0, 1, 1));
    }
}
