//! Credential primitives.
//!
//! - [`password`]: the hashing capability and its Argon2/bcrypt backends
//! - [`tokens`]: bearer-token and verification-code generation

pub mod password;
pub mod tokens;

pub use password::{Argon2Hasher, BcryptHasher, CredentialHasher, HashError};
pub use tokens::{generate_code, generate_token};
