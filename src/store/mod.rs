//! Account store capability.
//!
//! The orchestrator only sees [`AccountStore`]. Two backends exist:
//! - [`crate::db::Database`]: SQLite via SQLx
//! - [`MemoryStore`]: in-process maps, used by tests and ephemeral deployments
//!
//! Reads by key return `Ok(None)` for a missing row; `Err` is always a fault.

mod memory;

pub use memory::MemoryStore;

use crate::model::{AccessToken, Account, IdentityLink, NewAccount, Role, ServiceToken};
use async_trait::async_trait;
use thiserror::Error;

/// Store-level faults.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// A unique constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("code store error: {0}")]
    Cache(String),
    #[error("deadline exceeded during {0}")]
    Timeout(&'static str),
    #[error("cancelled during {0}")]
    Cancelled(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Cancelled(_) | Self::Cache(_) => true,
            Self::Sqlx(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            Self::Migration(_) | Self::Conflict(_) | Self::Internal(_) => false,
        }
    }
}

/// Persistent accounts, roles, tokens and identity links.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn account_by_id(&self, id: i64) -> Result<Option<Account>, StoreError>;

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Insert an account. A taken username yields [`StoreError::Conflict`].
    async fn create_account(&self, account: NewAccount<'_>) -> Result<Account, StoreError>;

    /// Point an account at another role. Returns `false` when no account matched.
    async fn update_account_role(&self, account_id: i64, role_id: i64)
    -> Result<bool, StoreError>;

    async fn role_by_id(&self, id: i64) -> Result<Option<Role>, StoreError>;

    async fn role_by_title(&self, title: &str) -> Result<Option<Role>, StoreError>;

    async fn create_access_token(
        &self,
        account_id: i64,
        token: &str,
    ) -> Result<AccessToken, StoreError>;

    async fn access_token_by_token(&self, token: &str) -> Result<Option<AccessToken>, StoreError>;

    /// Delete one access token row. Returns `false` when it was already gone.
    async fn delete_access_token(&self, id: i64) -> Result<bool, StoreError>;

    /// Insert a service token. A taken service name yields [`StoreError::Conflict`].
    async fn create_service_token(
        &self,
        service_name: &str,
        token: &str,
    ) -> Result<ServiceToken, StoreError>;

    async fn service_token_by_name(
        &self,
        service_name: &str,
    ) -> Result<Option<ServiceToken>, StoreError>;

    async fn service_token_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ServiceToken>, StoreError>;

    /// Insert an identity link. An account or secondary id that is already
    /// linked yields [`StoreError::Conflict`].
    async fn create_link(
        &self,
        account_id: i64,
        secondary_id: i64,
    ) -> Result<IdentityLink, StoreError>;

    async fn link_by_account_id(&self, account_id: i64)
    -> Result<Option<IdentityLink>, StoreError>;

    /// Cheap round trip used by health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
