//! Integration test common infrastructure.
//!
//! Provides orchestrators over each account store backend and an
//! in-process HTTP server for boundary tests.

pub mod server;

#[allow(unused_imports)]
pub use server::TestServer;

use authlink::codes::MemoryCodeStore;
use authlink::db::Database;
use authlink::security::BcryptHasher;
use authlink::service::{AuthCodeWriteMode, AuthService, AuthSettings};
use authlink::store::{AccountStore, MemoryStore};
use std::sync::Arc;

/// Settings for deterministic tests: awaited code writes.
pub fn test_settings() -> AuthSettings {
    AuthSettings {
        write_mode: AuthCodeWriteMode::Await,
        ..AuthSettings::default()
    }
}

/// Orchestrator over `accounts`, a fresh memory code store and a cheap hasher.
pub fn service_over(accounts: Arc<dyn AccountStore>) -> (AuthService, Arc<MemoryCodeStore>) {
    let codes = Arc::new(MemoryCodeStore::new());
    let service = AuthService::new(
        accounts,
        codes.clone(),
        Arc::new(BcryptHasher::new(4)),
        test_settings(),
    );
    (service, codes)
}

#[allow(dead_code)]
pub fn memory_service() -> (AuthService, Arc<MemoryStore>, Arc<MemoryCodeStore>) {
    let accounts = Arc::new(MemoryStore::new());
    let (service, codes) = service_over(accounts.clone());
    (service, accounts, codes)
}

#[allow(dead_code)]
pub async fn sqlite_service() -> anyhow::Result<(AuthService, Database, Arc<MemoryCodeStore>)> {
    let db = Database::new(":memory:").await?;
    let (service, codes) = service_over(Arc::new(db.clone()));
    Ok((service, db, codes))
}
