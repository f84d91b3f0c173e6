//! In-process account store.
//!
//! Keeps every table in one lock so multi-row checks (uniqueness) and the
//! write that follows them are atomic, the same guarantee SQLite's UNIQUE
//! constraints give the durable backend.

use super::{AccountStore, StoreError};
use crate::model::{AccessToken, Account, IdentityLink, NewAccount, Role, ServiceToken};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct AccountRow {
    id: i64,
    username: String,
    password_digest: String,
    role_id: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    roles: HashMap<i64, Role>,
    accounts: HashMap<i64, AccountRow>,
    access_tokens: HashMap<i64, AccessToken>,
    service_tokens: HashMap<i64, ServiceToken>,
    links: HashMap<i64, IdentityLink>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn to_account(&self, row: &AccountRow) -> Result<Account, StoreError> {
        let role = self.roles.get(&row.role_id).ok_or_else(|| {
            StoreError::Internal(format!("account {} references missing role {}", row.id, row.role_id))
        })?;
        Ok(Account {
            id: row.id,
            username: row.username.clone(),
            password_digest: row.password_digest.clone(),
            role: role.title.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Account store backed by in-memory maps.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store seeded with the `user` and `admin` roles.
    pub fn new() -> Self {
        Self::with_roles(&["user", "admin"])
    }

    /// Create a store seeded with the given role titles.
    pub fn with_roles(titles: &[&str]) -> Self {
        let mut tables = Tables::default();
        for title in titles {
            let id = tables.next_id();
            tables.roles.insert(
                id,
                Role {
                    id,
                    title: (*title).to_string(),
                },
            );
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Number of stored accounts.
    pub fn account_count(&self) -> usize {
        self.tables.read().accounts.len()
    }

    /// Number of stored access tokens.
    pub fn access_token_count(&self) -> usize {
        self.tables.read().access_tokens.len()
    }

    /// Number of stored service tokens for a service name.
    pub fn service_token_count(&self, service_name: &str) -> usize {
        self.tables
            .read()
            .service_tokens
            .values()
            .filter(|t| t.service_name == service_name)
            .count()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn account_by_id(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.read();
        tables
            .accounts
            .get(&id)
            .map(|row| tables.to_account(row))
            .transpose()
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.read();
        tables
            .accounts
            .values()
            .find(|row| row.username == username)
            .map(|row| tables.to_account(row))
            .transpose()
    }

    async fn create_account(&self, account: NewAccount<'_>) -> Result<Account, StoreError> {
        let mut tables = self.tables.write();
        if tables
            .accounts
            .values()
            .any(|row| row.username == account.username)
        {
            return Err(StoreError::Conflict(format!(
                "username {} is taken",
                account.username
            )));
        }
        if !tables.roles.contains_key(&account.role_id) {
            return Err(StoreError::Internal(format!(
                "role {} does not exist",
                account.role_id
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let id = tables.next_id();
        let row = AccountRow {
            id,
            username: account.username.to_string(),
            password_digest: account.password_digest.to_string(),
            role_id: account.role_id,
            created_at: now,
            updated_at: now,
        };
        let created = tables.to_account(&row)?;
        tables.accounts.insert(id, row);
        Ok(created)
    }

    async fn update_account_role(
        &self,
        account_id: i64,
        role_id: i64,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if !tables.roles.contains_key(&role_id) {
            return Err(StoreError::Internal(format!("role {} does not exist", role_id)));
        }
        match tables.accounts.get_mut(&account_id) {
            Some(row) => {
                row.role_id = role_id;
                row.updated_at = chrono::Utc::now().timestamp();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn role_by_id(&self, id: i64) -> Result<Option<Role>, StoreError> {
        Ok(self.tables.read().roles.get(&id).cloned())
    }

    async fn role_by_title(&self, title: &str) -> Result<Option<Role>, StoreError> {
        Ok(self
            .tables
            .read()
            .roles
            .values()
            .find(|r| r.title == title)
            .cloned())
    }

    async fn create_access_token(
        &self,
        account_id: i64,
        token: &str,
    ) -> Result<AccessToken, StoreError> {
        let mut tables = self.tables.write();
        if !tables.accounts.contains_key(&account_id) {
            return Err(StoreError::Internal(format!(
                "account {} does not exist",
                account_id
            )));
        }
        let now = chrono::Utc::now().timestamp();
        let id = tables.next_id();
        let row = AccessToken {
            id,
            account_id,
            token: token.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.access_tokens.insert(id, row.clone());
        Ok(row)
    }

    async fn access_token_by_token(&self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        Ok(self
            .tables
            .read()
            .access_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn delete_access_token(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables.write().access_tokens.remove(&id).is_some())
    }

    async fn create_service_token(
        &self,
        service_name: &str,
        token: &str,
    ) -> Result<ServiceToken, StoreError> {
        let mut tables = self.tables.write();
        if tables
            .service_tokens
            .values()
            .any(|t| t.service_name == service_name)
        {
            return Err(StoreError::Conflict(format!(
                "service {} already has a token",
                service_name
            )));
        }
        let now = chrono::Utc::now().timestamp();
        let id = tables.next_id();
        let row = ServiceToken {
            id,
            service_name: service_name.to_string(),
            token: token.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.service_tokens.insert(id, row.clone());
        Ok(row)
    }

    async fn service_token_by_name(
        &self,
        service_name: &str,
    ) -> Result<Option<ServiceToken>, StoreError> {
        Ok(self
            .tables
            .read()
            .service_tokens
            .values()
            .find(|t| t.service_name == service_name)
            .cloned())
    }

    async fn service_token_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ServiceToken>, StoreError> {
        Ok(self
            .tables
            .read()
            .service_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn create_link(
        &self,
        account_id: i64,
        secondary_id: i64,
    ) -> Result<IdentityLink, StoreError> {
        let mut tables = self.tables.write();
        if !tables.accounts.contains_key(&account_id) {
            return Err(StoreError::Internal(format!(
                "account {} does not exist",
                account_id
            )));
        }
        if tables
            .links
            .values()
            .any(|l| l.account_id == account_id || l.secondary_id == secondary_id)
        {
            return Err(StoreError::Conflict(format!(
                "account {} or secondary id {} already linked",
                account_id, secondary_id
            )));
        }
        let now = chrono::Utc::now().timestamp();
        let id = tables.next_id();
        let row = IdentityLink {
            id,
            account_id,
            secondary_id,
            created_at: now,
            updated_at: now,
        };
        tables.links.insert(id, row.clone());
        Ok(row)
    }

    async fn link_by_account_id(
        &self,
        account_id: i64,
    ) -> Result<Option<IdentityLink>, StoreError> {
        Ok(self
            .tables
            .read()
            .links
            .values()
            .find(|l| l.account_id == account_id)
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
