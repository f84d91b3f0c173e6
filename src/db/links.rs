//! Identity link repository.
//!
//! Both `account_id` and `secondary_id` are UNIQUE: an account links to at
//! most one secondary identity and vice versa.

use super::conflict_on_unique;
use crate::model::IdentityLink;
use crate::store::StoreError;
use sqlx::SqlitePool;

/// Repository for identity link operations.
pub struct LinkRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LinkRepository<'a> {
    /// Create a new link repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Link an account to a secondary identity.
    pub async fn create(
        &self,
        account_id: i64,
        secondary_id: i64,
    ) -> Result<IdentityLink, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO identity_links (account_id, secondary_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(account_id)
        .bind(secondary_id)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!(
                    "account {} or secondary id {} already linked",
                    account_id, secondary_id
                )
            })
        })?;

        Ok(IdentityLink {
            id: result.last_insert_rowid(),
            account_id,
            secondary_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Find the link for an account.
    pub async fn find_by_account_id(
        &self,
        account_id: i64,
    ) -> Result<Option<IdentityLink>, StoreError> {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            r#"
            SELECT id, account_id, secondary_id, created_at, updated_at
            FROM identity_links
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(id, account_id, secondary_id, created_at, updated_at)| IdentityLink {
                id,
                account_id,
                secondary_id,
                created_at,
                updated_at,
            },
        ))
    }
}
