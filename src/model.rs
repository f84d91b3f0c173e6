//! Records persisted by the account store.
//!
//! Timestamps are Unix seconds, matching the SQLite schema.

use serde::Serialize;

/// Role every newly registered account receives.
pub const DEFAULT_ROLE: &str = "user";

/// A registered account.
///
/// `role` is the role *title*; the numeric role id stays inside the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_digest: String,
    pub role: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A role from the fixed role vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: i64,
    pub title: String,
}

/// Bearer token proving an authenticated session for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub id: i64,
    pub account_id: i64,
    pub token: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Bearer token identifying a calling service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceToken {
    pub id: i64,
    pub service_name: String,
    pub token: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Durable pairing of an account with a secondary identity
/// (for example a messaging-platform user id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityLink {
    pub id: i64,
    pub account_id: i64,
    pub secondary_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields supplied when creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub password_digest: &'a str,
    pub role_id: i64,
}
