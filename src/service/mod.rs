//! Credential orchestrator.
//!
//! [`AuthService`] holds only store handles and read-only settings. Each
//! operation runs inside the caller's [`RequestContext`]: its span scopes
//! the logs, and every store call goes through [`RequestContext::run`] so a
//! cancelled or expired request aborts its store work.
//!
//! Operations are split by concern:
//! - [`accounts`]: register, login, logout, access-token check
//! - [`service_tokens`]: idempotent service-token issuance and check
//! - [`roles`]: role lookup and assignment
//! - [`verification`]: the two-step auth-code handshake

mod accounts;
mod roles;
mod service_tokens;
mod verification;

pub use accounts::LoginResponse;

use crate::codes::CodeStore;
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::security::CredentialHasher;
use crate::store::{AccountStore, StoreError};
use crate::telemetry::{OperationTimer, spans};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, warn};

/// How `generate_auth_code` persists the new code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthCodeWriteMode {
    /// Return the code immediately; the write runs on its own task.
    #[default]
    Detached,
    /// Return only after the code store acknowledged the write.
    Await,
}

/// Static orchestrator settings.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Digits per verification code.
    pub code_length: usize,
    /// Lifetime of a verification code.
    pub code_ttl: Duration,
    pub write_mode: AuthCodeWriteMode,
    /// Deadline for a detached code write.
    pub write_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            code_length: 6,
            code_ttl: Duration::from_secs(300),
            write_mode: AuthCodeWriteMode::Detached,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// The credential orchestrator.
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    codes: Arc<dyn CodeStore>,
    hasher: Arc<dyn CredentialHasher>,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        codes: Arc<dyn CodeStore>,
        hasher: Arc<dyn CredentialHasher>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            accounts,
            codes,
            hasher,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Whether the account store answers.
    pub async fn health(&self, ctx: &RequestContext) -> AuthResult<()> {
        ctx.run("ping", self.accounts.ping())
            .await
            .map_err(|e| fault("ping", e))
    }

    /// Run one operation inside its span, timing it and labelling the outcome.
    async fn observe<T, F>(&self, ctx: &RequestContext, op: &'static str, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        let mut timer = OperationTimer::new(op);
        let span = spans::operation(ctx.span(), op);
        let result = fut.instrument(span).await;
        timer.finish(match &result {
            Ok(_) => "ok",
            Err(e) => e.error_code(),
        });
        result
    }

    async fn hash_password(&self, password: &str) -> AuthResult<String> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        match tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
            Ok(Ok(digest)) => Ok(digest),
            Ok(Err(e)) => {
                error!(error = %e, "Failed to hash password");
                Err(AuthError::Internal)
            }
            Err(e) => {
                error!(error = %e, "Password hashing task failed");
                Err(AuthError::Internal)
            }
        }
    }

    async fn verify_password(&self, password: &str, digest: &str) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let digest = digest.to_string();
        match tokio::task::spawn_blocking(move || hasher.verify(&password, &digest)).await {
            Ok(Ok(matched)) => Ok(matched),
            Ok(Err(e)) => {
                error!(error = %e, "Stored password digest is unusable");
                Err(AuthError::Internal)
            }
            Err(e) => {
                error!(error = %e, "Password verification task failed");
                Err(AuthError::Internal)
            }
        }
    }

    async fn dummy_verify(&self, password: &str) {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        if let Err(e) = tokio::task::spawn_blocking(move || hasher.dummy_verify(&password)).await {
            warn!(error = %e, "Dummy verification task failed");
        }
    }
}

/// Log a store fault against the failing call and collapse it to an opaque kind.
fn fault(call: &'static str, err: StoreError) -> AuthError {
    let kind = AuthError::from(&err);
    match kind {
        AuthError::StoreUnavailable => warn!(call, error = %err, "Store call failed (transient)"),
        _ => error!(call, error = %err, "Store call failed"),
    }
    kind
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::codes::MemoryCodeStore;
    use crate::security::BcryptHasher;
    use crate::store::MemoryStore;

    /// Service over in-memory stores with awaited code writes and a cheap hasher.
    pub fn memory_service() -> (AuthService, Arc<MemoryStore>, Arc<MemoryCodeStore>) {
        let accounts = Arc::new(MemoryStore::new());
        let codes = Arc::new(MemoryCodeStore::new());
        let service = AuthService::new(
            accounts.clone(),
            codes.clone(),
            Arc::new(BcryptHasher::new(4)),
            AuthSettings {
                write_mode: AuthCodeWriteMode::Await,
                ..AuthSettings::default()
            },
        );
        (service, accounts, codes)
    }
}
