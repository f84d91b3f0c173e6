//! Account repository.
//!
//! Accounts reference their role by id; reads join the role table so callers
//! only ever see the role title.

use super::conflict_on_unique;
use crate::model::{Account, NewAccount};
use crate::store::StoreError;
use sqlx::SqlitePool;

type AccountRow = (i64, String, String, String, i64, i64);

fn from_row((id, username, password_digest, role, created_at, updated_at): AccountRow) -> Account {
    Account {
        id,
        username,
        password_digest,
        role,
        created_at,
        updated_at,
    }
}

/// Repository for account operations.
pub struct AccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account (UNIQUE constraint on username catches duplicates).
    pub async fn create(&self, account: NewAccount<'_>) -> Result<Account, StoreError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO accounts (username, password_hash, role_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.username)
        .bind(account.password_digest)
        .bind(account.role_id)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("username {} is taken", account.username)))?;

        self.find_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| StoreError::Internal("inserted account vanished".to_string()))
    }

    /// Find account by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT a.id, a.username, a.password_hash, r.title, a.created_at, a.updated_at
            FROM accounts a
            JOIN roles r ON a.role_id = r.id
            WHERE a.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Find account by exact username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT a.id, a.username, a.password_hash, r.title, a.created_at, a.updated_at
            FROM accounts a
            JOIN roles r ON a.role_id = r.id
            WHERE a.username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Repoint an account's role. Returns `false` when no account matched.
    pub async fn update_role(&self, account_id: i64, role_id: i64) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("UPDATE accounts SET role_id = ?, updated_at = ? WHERE id = ?")
            .bind(role_id)
            .bind(now)
            .bind(account_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Total number of accounts.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
