//! Role lookup and assignment.

use super::{AuthService, fault};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use tracing::info;

impl AuthService {
    /// Title of the account's current role.
    pub async fn get_role(&self, ctx: &RequestContext, account_id: i64) -> AuthResult<String> {
        self.observe(ctx, "get_role", async {
            let account = ctx
                .run("account_by_id", self.accounts.account_by_id(account_id))
                .await
                .map_err(|e| fault("account_by_id", e))?
                .ok_or(AuthError::NotFound("account"))?;
            Ok(account.role)
        })
        .await
    }

    /// Point the account at the role titled `role`.
    ///
    /// Unknown titles fail with `InvalidRole` before the account is touched.
    pub async fn set_role(
        &self,
        ctx: &RequestContext,
        account_id: i64,
        role: &str,
    ) -> AuthResult<()> {
        self.observe(ctx, "set_role", async {
            if role.is_empty() {
                return Err(AuthError::InvalidRole);
            }

            let role = ctx
                .run("role_by_title", self.accounts.role_by_title(role))
                .await
                .map_err(|e| fault("role_by_title", e))?
                .ok_or(AuthError::InvalidRole)?;

            ctx.run("account_by_id", self.accounts.account_by_id(account_id))
                .await
                .map_err(|e| fault("account_by_id", e))?
                .ok_or(AuthError::NotFound("account"))?;

            let updated = ctx
                .run(
                    "update_account_role",
                    self.accounts.update_account_role(account_id, role.id),
                )
                .await
                .map_err(|e| fault("update_account_role", e))?;
            if !updated {
                return Err(AuthError::NotFound("account"));
            }

            info!(account_id, role = %role.title, "Role updated");
            Ok(())
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
    async fn test_default_role_and_promotion() {
        let (service, _, _) = memory_service();
        let ctx = RequestContext::new();
        service.register(&ctx, "alice", "pw").await.unwrap();
        let id = service.login(&ctx, "alice", "pw").await.unwrap().account_id;

        assert_eq!(service.get_role(&ctx, id).await.unwrap(), "user");
        service.set_role(&ctx, id, "admin").await.unwrap();
        assert_eq!(service.get_role(&ctx, id).await.unwrap(), "admin");
    }

    #[tokio::test]
    async fn test_unknown_role_leaves_account_untouched() {
        let (service, _, _) = memory_service();
        let ctx = RequestContext::new();
        service.register(&ctx, "alice", "pw").await.unwrap();
        let id = service.login(&ctx, "alice", "pw").await.unwrap().account_id;

        assert_eq!(
            service.set_role(&ctx, id, "overlord").await,
            Err(AuthError::InvalidRole)
        );
        assert_eq!(service.get_role(&ctx, id).await.unwrap(), "user");
    }

    #[tokio::test]
    async fn test_missing_account() {
        let (service, _, _) = memory_service();
        let ctx = RequestContext::new();

        assert_eq!(
            service.get_role(&ctx, 404).await,
            Err(AuthError::NotFound("account"))
        );
        assert_eq!(
            service.set_role(&ctx, 404, "admin").await,
            Err(AuthError::NotFound("account"))
        );
    }
}
