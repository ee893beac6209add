//! Resolves bearer tokens to live accounts.

use std::sync::Arc;

use tb_core::error::{AppError, Result};
use tb_core::models::Account;
use tb_core::traits::{AccountRepo, TokenService};

pub struct Authenticator {
    tokens: Arc<dyn TokenService>,
    accounts: Arc<dyn AccountRepo>,
}

impl Authenticator {
    pub fn new(tokens: Arc<dyn TokenService>, accounts: Arc<dyn AccountRepo>) -> Self {
        Self { tokens, accounts }
    }

    /// Verifies the token and looks its account up on every call: an account
    /// deleted after the token was issued fails with `UnknownAccount`.
    pub async fn authenticate(&self, token: &str) -> Result<Account> {
        let account_id = self.tokens.verify(token)?;
        self.accounts
            .get_account(account_id)
            .await?
            .ok_or(AppError::UnknownAccount)
    }

    /// Never fails: a missing, bad or stale token just means "anonymous".
    pub async fn authenticate_optional(&self, token: Option<&str>) -> Option<Account> {
        let token = token?;
        match self.authenticate(token).await {
            Ok(account) => Some(account),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unusable token on optional auth");
                None
            }
        }
    }
}
