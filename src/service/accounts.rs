//! Registration, login, logout and access-token checks.

use super::{AuthService, fault};
use crate::context::RequestContext;
use crate::error::{AuthError, AuthResult};
use crate::model::{DEFAULT_ROLE, NewAccount};
use crate::security::generate_token;
use crate::store::StoreError;
use crate::telemetry::redact;
use serde::Serialize;
use tracing::{debug, error, info};

/// Successful login: the account and its fresh access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponse {
    #[serde(rename = "id")]
    pub account_id: i64,
    pub token: String,
}

fn require(value: &str, name: &'static str) -> AuthResult<()> {
    if value.is_empty() {
        return Err(AuthError::InvalidArgument(name));
    }
    Ok(())
}

impl AuthService {
    /// Create an account with the default role. No token is issued.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> AuthResult<()> {
        self.observe(ctx, "register", async {
            require(username, "username")?;
            require(password, "password")?;
            info!(username = %username, "Registration attempt");

            let existing = ctx
                .run("account_by_username", self.accounts.account_by_username(username))
                .await
                .map_err(|e| fault("account_by_username", e))?;
            if existing.is_some() {
                info!(username = %username, "Username already registered");
                return Err(AuthError::AlreadyExists);
            }

            let Some(role) = ctx
                .run("role_by_title", self.accounts.role_by_title(DEFAULT_ROLE))
                .await
                .map_err(|e| fault("role_by_title", e))?
            else {
                error!(role = DEFAULT_ROLE, "Default role is missing from the account store");
                return Err(AuthError::Internal);
            };

            let digest = self.hash_password(password).await?;

            let created = ctx
                .run(
                    "create_account",
                    self.accounts.create_account(NewAccount {
                        username,
                        password_digest: &digest,
                        role_id: role.id,
                    }),
                )
                .await;
            match created {
                Ok(account) => {
                    info!(account_id = account.id, "Account registered");
                    Ok(())
                }
                // Lost a race with a concurrent registration of the same name.
                Err(StoreError::Conflict(_)) => Err(AuthError::AlreadyExists),
                Err(e) => Err(fault("create_account", e)),
            }
        })
        .await
    }

    /// Check credentials and issue a fresh access token.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> AuthResult<LoginResponse> {
        self.observe(ctx, "login", async {
            require(username, "username")?;
            require(password, "password")?;
            info!(username = %username, "Login attempt");

            let account = ctx
                .run("account_by_username", self.accounts.account_by_username(username))
                .await
                .map_err(|e| fault("account_by_username", e))?;
            let Some(account) = account else {
                self.dummy_verify(password).await;
                info!(username = %username, "Login for unknown account");
                return Err(AuthError::NotFound("account"));
            };

            if !self.verify_password(password, &account.password_digest).await? {
                info!(account_id = account.id, "Invalid password");
                return Err(AuthError::BadCredentials);
            }

            let token = generate_token();
            ctx.run(
                "create_access_token",
                self.accounts.create_access_token(account.id, &token),
            )
            .await
            .map_err(|e| fault("create_access_token", e))?;

            info!(account_id = account.id, "Login successful");
            Ok(LoginResponse {
                account_id: account.id,
                token,
            })
        })
        .await
    }

    /// Delete exactly the access token row matching `token`.
    ///
    /// A second logout with the same token fails with `NotFound`.
    pub async fn logout(&self, ctx: &RequestContext, token: &str) -> AuthResult<()> {
        self.observe(ctx, "logout", async {
            require(token, "token")?;

            let Some(row) = ctx
                .run("access_token_by_token", self.accounts.access_token_by_token(token))
                .await
                .map_err(|e| fault("access_token_by_token", e))?
            else {
                info!(token = %redact(token), "Logout with unknown token");
                return Err(AuthError::NotFound("access token"));
            };

            let deleted = ctx
                .run("delete_access_token", self.accounts.delete_access_token(row.id))
                .await
                .map_err(|e| fault("delete_access_token", e))?;
            if !deleted {
                // A concurrent logout removed it first.
                return Err(AuthError::NotFound("access token"));
            }

            info!(account_id = row.account_id, "Logout successful");
            Ok(())
        })
        .await
    }

    /// Resolve an access token to its account id. Pure lookup.
    pub async fn check_access_token(&self, ctx: &RequestContext, token: &str) -> AuthResult<i64> {
        self.observe(ctx, "check_access_token", async {
            require(token, "token")?;

            match ctx
                .run("access_token_by_token", self.accounts.access_token_by_token(token))
                .await
                .map_err(|e| fault("access_token_by_token", e))?
            {
                Some(row) => {
                    debug!(account_id = row.account_id, "Access token valid");
                    Ok(row.account_id)
                }
                None => {
                    debug!(token = %redact(token), "Access token not found");
                    Err(AuthError::NotFound("access token"))
                }
            }
        })
        .await
    }
}
