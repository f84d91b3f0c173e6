//! Role repository. The role vocabulary is seeded by migrations.

use crate::model::Role;
use crate::store::StoreError;
use sqlx::SqlitePool;

/// Repository for role lookups.
pub struct RoleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoleRepository<'a> {
    /// Create a new role repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find role by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query_as::<_, (i64, String)>("SELECT id, title FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|(id, title)| Role { id, title }))
    }

    /// Find role by exact title.
    pub async fn find_by_title(&self, title: &str) -> Result<Option<Role>, StoreError> {
        let row =
            sqlx::query_as::<_, (i64, String)>("SELECT id, title FROM roles WHERE title = ?")
                .bind(title)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(id, title)| Role { id, title }))
    }

    /// List all roles ordered by id.
    pub async fn list(&self) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, title FROM roles ORDER BY id")
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id, title)| Role { id, title }).collect())
    }
}
