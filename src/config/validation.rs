//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{CodeStoreBackend, Config};
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.request_timeout_ms must be greater than zero")]
    ZeroRequestTimeout,
    #[error("auth_code.length must be between 4 and 12, got {0}")]
    InvalidCodeLength(usize),
    #[error("auth_code.ttl_secs must be greater than zero")]
    ZeroCodeTtl,
    #[error("auth_code.write_timeout_ms must be greater than zero")]
    ZeroWriteTimeout,
    #[error("code_store.prune_interval_secs must be greater than zero")]
    ZeroPruneInterval,
    #[error("password.bcrypt_cost must be between 4 and 31, got {0}")]
    InvalidBcryptCost(u32),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("code_store.path parent directory does not exist: {0}")]
    CodeStorePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.request_timeout_ms == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let auth_code = &config.auth_code;
    if !(4..=12).contains(&auth_code.length) {
        errors.push(ValidationError::InvalidCodeLength(auth_code.length));
    }
    if auth_code.ttl_secs == 0 {
        errors.push(ValidationError::ZeroCodeTtl);
    }
    if auth_code.write_timeout_ms == 0 {
        errors.push(ValidationError::ZeroWriteTimeout);
    }

    if config.code_store.prune_interval_secs == 0 {
        errors.push(ValidationError::ZeroPruneInterval);
    }

    let cost = config.password.bcrypt_cost;
    if !(4..=31).contains(&cost) {
        errors.push(ValidationError::InvalidBcryptCost(cost));
    }

    if config.database.path != ":memory:" && !parent_exists(&config.database.path) {
        errors.push(ValidationError::DatabasePathInvalid(
            config.database.path.clone(),
        ));
    }

    if config.code_store.backend == CodeStoreBackend::Redb
        && !parent_exists(&config.code_store.path)
    {
        errors.push(ValidationError::CodeStorePathInvalid(
            config.code_store.path.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parent_exists(path: &str) -> bool {
    match Path::new(path).parent() {
        Some(parent) => parent.as_os_str().is_empty() || parent.exists(),
        None => true,
    }
}
