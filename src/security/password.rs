//! Password hashing and verification.
//!
//! The orchestrator only sees [`CredentialHasher`]. Argon2 is the default
//! and bcrypt is selectable in config. Digests are self-describing, so
//! either hasher verifies digests written by the other: switching the
//! configured algorithm, or importing bcrypt accounts, keeps old logins
//! working.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Hashing failures. A password that simply does not match is not an error.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("argon2 error: {0}")]
    Argon2(argon2::password_hash::Error),
    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("malformed digest")]
    MalformedDigest,
}

impl From<argon2::password_hash::Error> for HashError {
    fn from(err: argon2::password_hash::Error) -> Self {
        HashError::Argon2(err)
    }
}

/// Password hashing capability.
pub trait CredentialHasher: Send + Sync {
    /// Produce a self-describing digest of `plaintext`.
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Check `plaintext` against a digest produced by [`Self::hash`].
    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError>;

    /// Spend roughly the time of one [`Self::verify`] without a real digest.
    ///
    /// Called when the account does not exist, so response time does not
    /// reveal whether a username is registered.
    fn dummy_verify(&self, _plaintext: &str) {}
}

/// Argon2id with library defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    /// Pre-computed Argon2id hash of a throwaway secret. Never matches.
    const DUMMY_HASH: &'static str = "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nLW9yYWNsZS1kdW1teQ$K4VZh8k8YL3E8H7E8H7E8H7E8H7E8H7E8H7E8H7E8Hs";
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)?
            .to_string())
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError> {
        if is_bcrypt_digest(digest) {
            return verify_bcrypt(plaintext, digest);
        }
        verify_argon2(plaintext, digest)
    }

    fn dummy_verify(&self, plaintext: &str) {
        if let Ok(parsed) = PasswordHash::new(Self::DUMMY_HASH) {
            let _ = Argon2::default().verify_password(plaintext.as_bytes(), &parsed);
        }
    }
}

/// bcrypt digests start with `$2a$`, `$2b$`, `$2x$` or `$2y$`.
fn is_bcrypt_digest(digest: &str) -> bool {
    digest.starts_with("$2")
}

fn verify_argon2(plaintext: &str, digest: &str) -> Result<bool, HashError> {
    let parsed = PasswordHash::new(digest).map_err(|_| HashError::MalformedDigest)?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

fn verify_bcrypt(plaintext: &str, digest: &str) -> Result<bool, HashError> {
    match bcrypt::verify(plaintext, digest) {
        Ok(matched) => Ok(matched),
        Err(bcrypt::BcryptError::InvalidHash(_))
        | Err(bcrypt::BcryptError::InvalidPrefix(_))
        | Err(bcrypt::BcryptError::InvalidBase64(_)) => Err(HashError::MalformedDigest),
        Err(e) => Err(e.into()),
    }
}

/// bcrypt with a configurable cost.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError> {
        if is_bcrypt_digest(digest) {
            return verify_bcrypt(plaintext, digest);
        }
        verify_argon2(plaintext, digest)
    }

    fn dummy_verify(&self, plaintext: &str) {
        // Hashing at the same cost costs the same as verifying.
        let _ = bcrypt::hash(plaintext, self.cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argon2_round_trip() {
        let hasher = Argon2Hasher;
        let digest = hasher.hash("hunter2").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(hasher.verify("hunter2", &digest).unwrap());
        assert!(!hasher.verify("hunter3", &digest).unwrap());
    }

    #[test]
    fn test_argon2_salts_differ() {
        let hasher = Argon2Hasher;
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_argon2_rejects_garbage_digest() {
        assert!(matches!(
            Argon2Hasher.verify("x", "not-a-digest"),
            Err(HashError::MalformedDigest)
        ));
    }

    #[test]
    fn test_argon2_hasher_accepts_bcrypt_digest() {
        let digest = BcryptHasher::new(4).hash("hunter2").unwrap();
        assert!(digest.starts_with("$2"));
        assert!(Argon2Hasher.verify("hunter2", &digest).unwrap());
        assert!(!Argon2Hasher.verify("hunter3", &digest).unwrap());
    }

    #[test]
    fn test_bcrypt_hasher_accepts_argon2_digest() {
        let digest = Argon2Hasher.hash("hunter2").unwrap();
        let hasher = BcryptHasher::new(4);
        assert!(hasher.verify("hunter2", &digest).unwrap());
        assert!(!hasher.verify("hunter3", &digest).unwrap());
        assert!(matches!(
            hasher.verify("x", "not-a-digest"),
            Err(HashError::MalformedDigest)
        ));
    }

    #[test]
    fn test_bcrypt_round_trip() {
        let hasher = BcryptHasher::new(4);
        let digest = hasher.hash("hunter2").unwrap();
        assert!(hasher.verify("hunter2", &digest).unwrap());
        assert!(!hasher.verify("wrong", &digest).unwrap());
    }
}
