//! Service-token issuance and checks.
//!
//! Issuance is idempotent per service name. Checks report absence as
//! `false`, unlike access-token checks which report it as `NotFound`.

use super::{AuthService, fault};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::security::generate_token;
use crate::store::StoreError;
use crate::telemetry::redact;
use tracing::{debug, error, info};

impl AuthService {
    /// Return the token for `service_name`, creating it on first request.
    pub async fn generate_service_token(
        &self,
        ctx: &RequestContext,
        service_name: &str,
    ) -> AuthResult<String> {
        self.observe(ctx, "generate_service_token", async {
            if service_name.is_empty() {
                return Err(AuthError::InvalidArgument("service_name"));
            }

            if let Some(existing) = ctx
                .run(
                    "service_token_by_name",
                    self.accounts.service_token_by_name(service_name),
                )
                .await
                .map_err(|e| fault("service_token_by_name", e))?
            {
                debug!(service = %service_name, "Service token already exists");
                return Ok(existing.token);
            }

            let token = generate_token();
            let created = ctx
                .run(
                    "create_service_token",
                    self.accounts.create_service_token(service_name, &token),
                )
                .await;
            match created {
                Ok(row) => {
                    info!(service = %service_name, "Service token generated");
                    Ok(row.token)
                }
                Err(StoreError::Conflict(_)) => {
                    // A concurrent request issued it first; hand out the winner.
                    let winner = ctx
                        .run(
                            "service_token_by_name",
                            self.accounts.service_token_by_name(service_name),
                        )
                        .await
                        .map_err(|e| fault("service_token_by_name", e))?;
                    match winner {
                        Some(row) => Ok(row.token),
                        None => {
                            error!(service = %service_name, "Service token conflict without a stored row");
                            Err(AuthError::Internal)
                        }
                    }
                }
                Err(e) => Err(fault("create_service_token", e)),
            }
        })
        .await
    }

    /// Whether `token` belongs to any service. Absence is `Ok(false)`.
    pub async fn check_service_token(&self, ctx: &RequestContext, token: &str) -> AuthResult<bool> {
        self.observe(ctx, "check_service_token", async {
            if token.is_empty() {
                return Ok(false);
            }

            let row = ctx
                .run("service_token_by_token", self.accounts.service_token_by_token(token))
                .await
                .map_err(|e| fault("service_token_by_token", e))?;
            match row {
                Some(row) => {
                    debug!(service = %row.service_name, "Service token valid");
                    Ok(true)
                }
                None => {
                    debug!(token = %redact(token), "Service token not found");
                    Ok(false)
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::context::RequestContext;
    use crate::error::AuthError;
    use crate::service::test_support::memory_service;

    #[tokio::test]
    async fn test_issuance_is_idempotent() {
        let (service, accounts, _) = memory_service();
        let ctx = RequestContext::new();

        let first = service.generate_service_token(&ctx, "svcA").await.unwrap();
        let second = service.generate_service_token(&ctx, "svcA").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(accounts.service_token_count("svcA"), 1);

        let other = service.generate_service_token(&ctx, "svcB").await.unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_concurrent_issuance_converges() {
        let (service, accounts, _) = memory_service();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .generate_service_token(&RequestContext::new(), "svcC")
                        .await
                })
            })
            .collect();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap());
        }
        tokens.dedup();
        assert_eq!(tokens.len(), 1);
        assert_eq!(accounts.service_token_count("svcC"), 1);
    }

    #[tokio::test]
    async fn test_check_reports_absence_as_false() {
        let (service, _, _) = memory_service();
        let ctx = RequestContext::new();
        let token = service.generate_service_token(&ctx, "svcA").await.unwrap();

        assert_eq!(service.check_service_token(&ctx, &token).await, Ok(true));
        assert_eq!(service.check_service_token(&ctx, "nope").await, Ok(false));
        assert_eq!(service.check_service_token(&ctx, "").await, Ok(false));
    }

    #[tokio::test]
    async fn test_empty_service_name() {
        let (service, _, _) = memory_service();
        assert_eq!(
            service
                .generate_service_token(&RequestContext::new(), "")
                .await,
            Err(AuthError::InvalidArgument("service_name"))
        );
    }
}
