//! Two-step verification handshake.
//!
//! Step A issues a short numeric code and stores `code -> identity id` with
//! a TTL. Step B redeems the code for an account: it binds the account to
//! the identity recovered from the code store (creating the link on first
//! use) and consumes the code.
//!
//! Step B orders its store calls strictly: code lookup, then link
//! resolution, then code deletion. Only the caller whose delete actually
//! removed the code is told the code verified.

use super::{AuthCodeWriteMode, AuthService, fault};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::model::IdentityLink;
use crate::security::generate_code;
use crate::store::StoreError;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, warn};

impl AuthService {
    /// Issue a verification code vouching for `identity_id`.
    ///
    /// With [`AuthCodeWriteMode::Detached`] the code is returned before the
    /// write lands; a failed write is logged and the code simply never
    /// verifies.
    pub async fn generate_auth_code(
        &self,
        ctx: &RequestContext,
        identity_id: i64,
    ) -> AuthResult<String> {
        self.observe(ctx, "generate_auth_code", async {
            let code = generate_code(self.settings.code_length);
            let ttl = self.settings.code_ttl;

            match self.settings.write_mode {
                AuthCodeWriteMode::Await => {
                    ctx.run("code_set", self.codes.set(&code, identity_id, ttl))
                        .await
                        .map_err(|e| fault("code_set", e))?;
                }
                AuthCodeWriteMode::Detached => {
                    let write_ctx = ctx.detached(self.settings.write_timeout);
                    let codes = Arc::clone(&self.codes);
                    let key = code.clone();
                    tokio::spawn(
                        async move {
                            let result = write_ctx
                                .run("code_set", codes.set(&key, identity_id, ttl))
                                .await;
                            if let Err(e) = result {
                                crate::metrics::record_detached_write_failure();
                                warn!(identity_id, error = %e, "Failed to store auth code");
                            }
                        }
                        .in_current_span(),
                    );
                }
            }

            info!(identity_id, ttl_secs = ttl.as_secs(), "Auth code issued");
            Ok(code)
        })
        .await
    }

    /// Redeem `code` for `account_id`.
    ///
    /// Returns `Ok(true)` exactly once per code. Every way the code can fail
    /// to prove the binding (absent, expired, already used, bound to a
    /// different identity, link not creatable) is `VerificationFailed`. A
    /// failed cleanup after a successful match is `StoreUnavailable`.
    pub async fn verify(
        &self,
        ctx: &RequestContext,
        account_id: i64,
        code: &str,
    ) -> AuthResult<bool> {
        self.observe(ctx, "verify", async {
            if code.is_empty() {
                return Err(AuthError::InvalidArgument("code"));
            }

            let Some(identity_id) = ctx
                .run("code_get", self.codes.get(code))
                .await
                .map_err(|e| fault("code_get", e))?
            else {
                info!(account_id, "Auth code absent or expired");
                return Err(AuthError::VerificationFailed);
            };

            let link = self.resolve_link(ctx, account_id, identity_id).await?;
            if link.secondary_id != identity_id {
                info!(
                    account_id,
                    linked = link.secondary_id,
                    presented = identity_id,
                    "Auth code belongs to a different identity"
                );
                return Err(AuthError::VerificationFailed);
            }

            let consumed = ctx
                .run("code_delete", self.codes.delete(code))
                .await
                .map_err(|e| {
                    error!(account_id, error = %e, "Verified auth code could not be consumed");
                    AuthError::StoreUnavailable
                })?;
            if !consumed {
                info!(account_id, "Auth code consumed by a concurrent verification");
                return Err(AuthError::VerificationFailed);
            }

            info!(account_id, identity_id, "Auth code verified");
            Ok(true)
        })
        .await
    }

    /// Existing link for `account_id`, or a new one to `identity_id`.
    async fn resolve_link(
        &self,
        ctx: &RequestContext,
        account_id: i64,
        identity_id: i64,
    ) -> AuthResult<IdentityLink> {
        if let Some(link) = ctx
            .run("link_by_account_id", self.accounts.link_by_account_id(account_id))
            .await
            .map_err(|e| fault("link_by_account_id", e))?
        {
            return Ok(link);
        }

        match ctx
            .run("create_link", self.accounts.create_link(account_id, identity_id))
            .await
        {
            Ok(link) => {
                info!(account_id, identity_id, "Identity link created");
                Ok(link)
            }
            Err(StoreError::Conflict(reason)) => {
                // Either a concurrent verifier linked this account first, or
                // the identity is already bound to another account.
                debug!(account_id, reason = %reason, "Identity link conflict");
                ctx.run("link_by_account_id", self.accounts.link_by_account_id(account_id))
                    .await
                    .map_err(|e| fault("link_by_account_id", e))?
                    .ok_or(AuthError::VerificationFailed)
            }
            Err(e) => {
                warn!(account_id, identity_id, error = %e, "Failed to create identity link");
                Err(AuthError::VerificationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{CodeStore, CodeStoreError, MemoryCodeStore};
    use crate::security::BcryptHasher;
    use crate::service::AuthSettings;
    use crate::service::test_support::memory_service;
    use crate::store::{AccountStore, MemoryStore};
    use async_trait::async_trait;
    use std::time::Duration;

    async fn account(service: &AuthService, username: &str) -> i64 {
        let ctx = RequestContext::new();
        service.register(&ctx, username, "pw").await.unwrap();
        service.login(&ctx, username, "pw").await.unwrap().account_id
    }

    #[tokio::test]
    async fn test_generated_code_shape() {
        let (service, _, codes) = memory_service();
        let code = service
            .generate_auth_code(&RequestContext::new(), 7)
            .await
            .unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(codes.get(&code).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_verify_is_single_use() {
        let (service, accounts, _) = memory_service();
        let ctx = RequestContext::new();
        let alice = account(&service, "alice").await;

        let code = service.generate_auth_code(&ctx, 999).await.unwrap();
        assert_eq!(service.verify(&ctx, alice, &code).await, Ok(true));
        assert_eq!(
            service.verify(&ctx, alice, &code).await,
            Err(AuthError::VerificationFailed)
        );

        let link = accounts.link_by_account_id(alice).await.unwrap().unwrap();
        assert_eq!(link.secondary_id, 999);
    }

    #[tokio::test]
    async fn test_worked_example() {
        let (service, accounts, codes) = memory_service();
        let ctx = RequestContext::new();
        let alice = account(&service, "alice").await;
        codes
            .set("483920", 999, Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(service.verify(&ctx, alice, "483920").await, Ok(true));
        let link = accounts.link_by_account_id(alice).await.unwrap().unwrap();
        assert_eq!((link.account_id, link.secondary_id), (alice, 999));
        assert_eq!(
            service.verify(&ctx, alice, "483920").await,
            Err(AuthError::VerificationFailed)
        );
    }

    #[tokio::test]
    async fn test_existing_link_is_reused() {
        let (service, accounts, codes) = memory_service();
        let ctx = RequestContext::new();
        let alice = account(&service, "alice").await;
        accounts.create_link(alice, 999).await.unwrap();

        codes.set("111111", 999, Duration::from_secs(60)).await.unwrap();
        assert_eq!(service.verify(&ctx, alice, "111111").await, Ok(true));

        codes.set("222222", 555, Duration::from_secs(60)).await.unwrap();
        assert_eq!(
            service.verify(&ctx, alice, "222222").await,
            Err(AuthError::VerificationFailed)
        );
        // A mismatched code is not consumed.
        assert_eq!(codes.get("222222").await.unwrap(), Some(555));
    }

    #[tokio::test]
    async fn test_identity_linked_elsewhere_fails() {
        let (service, accounts, codes) = memory_service();
        let ctx = RequestContext::new();
        let alice = account(&service, "alice").await;
        let bob = account(&service, "bob").await;
        accounts.create_link(alice, 999).await.unwrap();

        codes.set("333333", 999, Duration::from_secs(60)).await.unwrap();
        assert_eq!(
            service.verify(&ctx, bob, "333333").await,
            Err(AuthError::VerificationFailed)
        );
        assert!(accounts.link_by_account_id(bob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_account_cannot_link() {
        let (service, accounts, codes) = memory_service();
        codes.set("483920", 999, Duration::from_secs(60)).await.unwrap();

        assert_eq!(
            service.verify(&RequestContext::new(), 42, "483920").await,
            Err(AuthError::VerificationFailed)
        );
        assert!(accounts.link_by_account_id(42).await.unwrap().is_none());
        // The code survives for the account it was meant for.
        assert_eq!(codes.get("483920").await.unwrap(), Some(999));
    }

    #[tokio::test]
    async fn test_expired_code_fails() {
        let (service, _, codes) = memory_service();
        let ctx = RequestContext::new();
        codes.set("444444", 999, Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(
            service.verify(&ctx, 42, "444444").await,
            Err(AuthError::VerificationFailed)
        );
    }

    #[tokio::test]
    async fn test_detached_write_lands() {
        let accounts = Arc::new(MemoryStore::new());
        let codes = Arc::new(MemoryCodeStore::new());
        let service = AuthService::new(
            accounts,
            codes.clone(),
            Arc::new(BcryptHasher::new(4)),
            AuthSettings::default(),
        );

        let code = service
            .generate_auth_code(&RequestContext::new(), 999)
            .await
            .unwrap();

        let landed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if codes.get(&code).await.unwrap().is_some() {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(landed.is_ok());
    }

    /// Code store whose writes fail and whose deletes fail, to exercise
    /// the fault paths.
    struct BrokenCodeStore {
        inner: MemoryCodeStore,
        fail_set: bool,
        fail_delete: bool,
    }

    #[async_trait]
    impl CodeStore for BrokenCodeStore {
        async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CodeStoreError> {
            if self.fail_set {
                return Err(CodeStoreError::Serialization("write refused".into()));
            }
            self.inner.set(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> Result<Option<i64>, CodeStoreError> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> Result<bool, CodeStoreError> {
            if self.fail_delete {
                return Err(CodeStoreError::Serialization("delete refused".into()));
            }
            self.inner.delete(key).await
        }

        async fn prune_expired(&self) -> Result<usize, CodeStoreError> {
            self.inner.prune_expired().await
        }
    }

    fn service_with(codes: BrokenCodeStore, mode: AuthCodeWriteMode) -> AuthService {
        AuthService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(codes),
            Arc::new(BcryptHasher::new(4)),
            AuthSettings {
                write_mode: mode,
                ..AuthSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_detached_write_failure_does_not_fail_issue() {
        let service = service_with(
            BrokenCodeStore {
                inner: MemoryCodeStore::new(),
                fail_set: true,
                fail_delete: false,
            },
            AuthCodeWriteMode::Detached,
        );
        let ctx = RequestContext::new();

        let code = service.generate_auth_code(&ctx, 999).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            service.verify(&ctx, 42, &code).await,
            Err(AuthError::VerificationFailed)
        );
    }

    #[tokio::test]
    async fn test_awaited_write_failure_is_unavailable() {
        let service = service_with(
            BrokenCodeStore {
                inner: MemoryCodeStore::new(),
                fail_set: true,
                fail_delete: false,
            },
            AuthCodeWriteMode::Await,
        );
        assert_eq!(
            service.generate_auth_code(&RequestContext::new(), 999).await,
            Err(AuthError::StoreUnavailable)
        );
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_retryable_not_unverified() {
        let inner = MemoryCodeStore::new();
        inner.set("555555", 999, Duration::from_secs(60)).await.unwrap();
        let service = service_with(
            BrokenCodeStore {
                inner,
                fail_set: false,
                fail_delete: true,
            },
            AuthCodeWriteMode::Await,
        );
        let alice = account(&service, "alice").await;

        assert_eq!(
            service.verify(&RequestContext::new(), alice, "555555").await,
            Err(AuthError::StoreUnavailable)
        );
    }
}
