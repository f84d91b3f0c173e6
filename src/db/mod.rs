//! SQLite persistence for the account store.
//!
//! Provides async SQLite access using SQLx for:
//! - accounts and their roles
//! - access and service tokens
//! - identity links

mod accounts;
mod links;
mod roles;
mod tokens;

pub use accounts::AccountRepository;
pub use links::LinkRepository;
pub use roles::RoleRepository;
pub use tokens::TokenRepository;

use crate::model::{AccessToken, Account, IdentityLink, NewAccount, Role, ServiceToken};
use crate::store::{AccountStore, StoreError};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (or create) a database, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let pool = if path == ":memory:" {
            // A uniquely named shared-cache database per call; a bare
            // `:memory:` would give each pooled connection its own database.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:authlink-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .foreign_keys(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .foreign_keys(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(StoreError::Internal(format!(
                "database integrity check failed: {}",
                integrity_result
            )));
        }

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(pool).await?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get account repository.
    pub fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(&self.pool)
    }

    /// Get role repository.
    pub fn roles(&self) -> RoleRepository<'_> {
        RoleRepository::new(&self.pool)
    }

    /// Get token repository.
    pub fn tokens(&self) -> TokenRepository<'_> {
        TokenRepository::new(&self.pool)
    }

    /// Get identity link repository.
    pub fn links(&self) -> LinkRepository<'_> {
        LinkRepository::new(&self.pool)
    }
}

/// Map a unique-constraint violation to [`StoreError::Conflict`].
fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(what());
    }
    StoreError::from(err)
}

#[async_trait]
impl AccountStore for Database {
    async fn account_by_id(&self, id: i64) -> Result<Option<Account>, StoreError> {
        self.accounts().find_by_id(id).await
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.accounts().find_by_username(username).await
    }

    async fn create_account(&self, account: NewAccount<'_>) -> Result<Account, StoreError> {
        self.accounts().create(account).await
    }

    async fn update_account_role(
        &self,
        account_id: i64,
        role_id: i64,
    ) -> Result<bool, StoreError> {
        self.accounts().update_role(account_id, role_id).await
    }

    async fn role_by_id(&self, id: i64) -> Result<Option<Role>, StoreError> {
        self.roles().find_by_id(id).await
    }

    async fn role_by_title(&self, title: &str) -> Result<Option<Role>, StoreError> {
        self.roles().find_by_title(title).await
    }

    async fn create_access_token(
        &self,
        account_id: i64,
        token: &str,
    ) -> Result<AccessToken, StoreError> {
        self.tokens().create_access_token(account_id, token).await
    }

    async fn access_token_by_token(&self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        self.tokens().find_access_token(token).await
    }

    async fn delete_access_token(&self, id: i64) -> Result<bool, StoreError> {
        self.tokens().delete_access_token(id).await
    }

    async fn create_service_token(
        &self,
        service_name: &str,
        token: &str,
    ) -> Result<ServiceToken, StoreError> {
        self.tokens().create_service_token(service_name, token).await
    }

    async fn service_token_by_name(
        &self,
        service_name: &str,
    ) -> Result<Option<ServiceToken>, StoreError> {
        self.tokens().find_service_token_by_name(service_name).await
    }

    async fn service_token_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ServiceToken>, StoreError> {
        self.tokens().find_service_token(token).await
    }

    async fn create_link(
        &self,
        account_id: i64,
        secondary_id: i64,
    ) -> Result<IdentityLink, StoreError> {
        self.links().create(account_id, secondary_id).await
    }

    async fn link_by_account_id(
        &self,
        account_id: i64,
    ) -> Result<Option<IdentityLink>, StoreError> {
        self.links().find_by_account_id(account_id).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
