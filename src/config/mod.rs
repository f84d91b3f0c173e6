//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions, one per TOML section
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup checks that collect every error found

mod defaults;
mod types;
mod validation;

pub use types::{
    AuthCodeConfig, CodeStoreBackend, CodeStoreConfig, Config, ConfigError, DatabaseConfig,
    PasswordAlgorithm, PasswordConfig, ServerConfig,
};
pub use validation::{ValidationError, validate};
