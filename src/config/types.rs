//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use crate::security::{Argon2Hasher, BcryptHasher, CredentialHasher};
use crate::service::{AuthCodeWriteMode, AuthSettings};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub code_store: CodeStoreConfig,
    #[serde(default)]
    pub auth_code: AuthCodeConfig,
    #[serde(default)]
    pub password: PasswordConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// HTTP boundary configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Deadline placed on every request context.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Expose Prometheus metrics at `/metrics`.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_ms: default_request_timeout_ms(),
            metrics: true,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Where verification codes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStoreBackend {
    /// Process memory. Codes are lost on restart.
    #[default]
    Memory,
    /// Embedded redb file.
    Redb,
}

/// Ephemeral code store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeStoreConfig {
    #[serde(default)]
    pub backend: CodeStoreBackend,
    /// redb file path (redb backend only).
    #[serde(default = "default_code_store_path")]
    pub path: String,
    /// Seconds between expired-code sweeps.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

impl Default for CodeStoreConfig {
    fn default() -> Self {
        Self {
            backend: CodeStoreBackend::Memory,
            path: default_code_store_path(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

impl CodeStoreConfig {
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

/// Verification code issuance.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthCodeConfig {
    /// Digits per code (4..=12).
    #[serde(default = "default_code_length")]
    pub length: usize,
    #[serde(default = "default_code_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub write_mode: AuthCodeWriteMode,
    /// Deadline for a detached code write.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for AuthCodeConfig {
    fn default() -> Self {
        Self {
            length: default_code_length(),
            ttl_secs: default_code_ttl_secs(),
            write_mode: AuthCodeWriteMode::default(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl AuthCodeConfig {
    /// Orchestrator settings derived from this section.
    pub fn settings(&self) -> AuthSettings {
        AuthSettings {
            code_length: self.length,
            code_ttl: Duration::from_secs(self.ttl_secs),
            write_mode: self.write_mode,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

/// Password hashing algorithm for new digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    #[default]
    Argon2,
    Bcrypt,
}

/// Password hashing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    #[serde(default)]
    pub algorithm: PasswordAlgorithm,
    /// bcrypt work factor (4..=31).
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            algorithm: PasswordAlgorithm::Argon2,
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl PasswordConfig {
    /// Build the configured hasher.
    pub fn hasher(&self) -> Arc<dyn CredentialHasher> {
        match self.algorithm {
            PasswordAlgorithm::Argon2 => Arc::new(Argon2Hasher),
            PasswordAlgorithm::Bcrypt => Arc::new(BcryptHasher::new(self.bcrypt_cost)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen());
        assert!(config.server.metrics);
        assert_eq!(config.database.path, "authlink.db");
        assert_eq!(config.code_store.backend, CodeStoreBackend::Memory);
        assert_eq!(config.auth_code.length, 6);
        assert_eq!(config.auth_code.write_mode, AuthCodeWriteMode::Detached);
        assert_eq!(config.password.algorithm, PasswordAlgorithm::Argon2);
    }

    #[test]
    fn test_full_file_parses() {
        let toml = r#"
[server]
listen = "127.0.0.1:9000"
request_timeout_ms = 2500
metrics = false

[database]
path = ":memory:"

[code_store]
backend = "redb"
path = "/var/lib/authlink/codes.redb"
prune_interval_secs = 30

[auth_code]
length = 8
ttl_secs = 120
write_mode = "await"
write_timeout_ms = 1000

[password]
algorithm = "bcrypt"
bcrypt_cost = 10
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.request_timeout(), Duration::from_millis(2500));
        assert!(!config.server.metrics);
        assert_eq!(config.code_store.backend, CodeStoreBackend::Redb);
        assert_eq!(config.code_store.prune_interval(), Duration::from_secs(30));
        assert_eq!(config.password.algorithm, PasswordAlgorithm::Bcrypt);

        let settings = config.auth_code.settings();
        assert_eq!(settings.code_length, 8);
        assert_eq!(settings.code_ttl, Duration::from_secs(120));
        assert_eq!(settings.write_mode, AuthCodeWriteMode::Await);
        assert_eq!(settings.write_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result: Result<Config, _> = toml::from_str("[code_store]\nbackend = \"redis\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/authlink.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
