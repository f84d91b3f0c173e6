//! Access token and service token repository.

use super::conflict_on_unique;
use crate::model::{AccessToken, ServiceToken};
use crate::store::StoreError;
use sqlx::SqlitePool;

/// Repository for bearer token operations.
pub struct TokenRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TokenRepository<'a> {
    /// Create a new token repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store an access token for an account.
    pub async fn create_access_token(
        &self,
        account_id: i64,
        token: &str,
    ) -> Result<AccessToken, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO access_tokens (account_id, token, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(account_id)
        .bind(token)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(AccessToken {
            id: result.last_insert_rowid(),
            account_id,
            token: token.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Find an access token by its exact string.
    pub async fn find_access_token(&self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        let row = sqlx::query_as::<_, (i64, i64, String, i64, i64)>(
            r#"
            SELECT id, account_id, token, created_at, updated_at
            FROM access_tokens
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(id, account_id, token, created_at, updated_at)| AccessToken {
                id,
                account_id,
                token,
                created_at,
                updated_at,
            },
        ))
    }

    /// Delete an access token row by id.
    pub async fn delete_access_token(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Store a service token (UNIQUE constraint on service_name catches duplicates).
    pub async fn create_service_token(
        &self,
        service_name: &str,
        token: &str,
    ) -> Result<ServiceToken, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO service_tokens (service_name, token, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(service_name)
        .bind(token)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || format!("service {} already has a token", service_name))
        })?;

        Ok(ServiceToken {
            id: result.last_insert_rowid(),
            service_name: service_name.to_string(),
            token: token.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Find a service token by service name.
    pub async fn find_service_token_by_name(
        &self,
        service_name: &str,
    ) -> Result<Option<ServiceToken>, StoreError> {
        let row = sqlx::query_as::<_, (i64, String, String, i64, i64)>(
            r#"
            SELECT id, service_name, token, created_at, updated_at
            FROM service_tokens
            WHERE service_name = ?
            "#,
        )
        .bind(service_name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(service_token_from_row))
    }

    /// Find a service token by its exact string.
    pub async fn find_service_token(
        &self,
        token: &str,
    ) -> Result<Option<ServiceToken>, StoreError> {
        let row = sqlx::query_as::<_, (i64, String, String, i64, i64)>(
            r#"
            SELECT id, service_name, token, created_at, updated_at
            FROM service_tokens
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(service_token_from_row))
    }
}

fn service_token_from_row(
    (id, service_name, token, created_at, updated_at): (i64, String, String, i64, i64),
) -> ServiceToken {
    ServiceToken {
        id,
        service_name,
        token,
        created_at,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::model::NewAccount;
    use crate::store::StoreError;

    #[tokio::test]
    async fn test_access_token_lifecycle() {
        let db = Database::new(":memory:").await.unwrap();
        let role = db.roles().find_by_title("user").await.unwrap().unwrap();
        let account = db
            .accounts()
            .create(NewAccount {
                username: "alice",
                password_digest: "x",
                role_id: role.id,
            })
            .await
            .unwrap();

        let token = db.tokens().create_access_token(account.id, "tok-1").await.unwrap();
        let found = db.tokens().find_access_token("tok-1").await.unwrap().unwrap();
        assert_eq!(found.account_id, account.id);

        assert!(db.tokens().delete_access_token(token.id).await.unwrap());
        assert!(db.tokens().find_access_token("tok-1").await.unwrap().is_none());
        assert!(!db.tokens().delete_access_token(token.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_access_token_requires_account() {
        let db = Database::new(":memory:").await.unwrap();
        let err = db.tokens().create_access_token(4242, "orphan").await.unwrap_err();
        assert!(matches!(err, StoreError::Sqlx(_)));
    }

    #[tokio::test]
    async fn test_service_token_name_is_unique() {
        let db = Database::new(":memory:").await.unwrap();
        db.tokens().create_service_token("svcA", "t1").await.unwrap();

        let err = db.tokens().create_service_token("svcA", "t2").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let by_name = db.tokens().find_service_token_by_name("svcA").await.unwrap().unwrap();
        assert_eq!(by_name.token, "t1");
        assert!(db.tokens().find_service_token("t2").await.unwrap().is_none());
    }
}
