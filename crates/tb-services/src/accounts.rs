//! Registration, login, profiles and account deletion.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tb_core::error::{AppError, Result};
use tb_core::models::{Account, AccountSummary, Role};
use tb_core::traits::{AccountRepo, CredentialHasher, IssuedToken, PostRepo, TokenService};
use uuid::Uuid;

use crate::retry::update_account;

/// Already-validated registration payload.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub handle: String,
    pub secret: String,
    pub contact: Option<String>,
}

/// Token plus the safe projection of the account it was issued for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub account: AccountSummary,
}

impl Session {
    fn new(issued: IssuedToken, account: &Account) -> Self {
        Self {
            token: issued.token,
            expires_at: issued.expires_at,
            account: AccountSummary::from(account),
        }
    }
}

/// What anyone may see about an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub handle: String,
    pub role: Role,
    pub post_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub posts_deleted: u64,
    pub accounts_deleted: u64,
}

pub struct AccountService {
    accounts: Arc<dyn AccountRepo>,
    posts: Arc<dyn PostRepo>,
    tokens: Arc<dyn TokenService>,
    hasher: Arc<dyn CredentialHasher>,
    admin_handles: HashSet<String>,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepo>,
        posts: Arc<dyn PostRepo>,
        tokens: Arc<dyn TokenService>,
        hasher: Arc<dyn CredentialHasher>,
        admin_handles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            accounts,
            posts,
            tokens,
            hasher,
            admin_handles: admin_handles.into_iter().collect(),
        }
    }

    /// Creates the account and signs the caller in. `Conflict` if the handle
    /// or contact address is taken.
    pub async fn register(&self, new: NewAccount) -> Result<Session> {
        let password_hash = self.hasher.hash_secret(&new.secret).await?;
        let role = if self.admin_handles.contains(&new.handle) {
            Role::Admin
        } else {
            Role::Member
        };
        let account = Account::new(new.handle, password_hash, new.contact, role, Utc::now());
        self.accounts.insert_account(account.clone()).await?;

        tracing::info!(account_id = %account.id, handle = %account.handle, role = role.as_str(), "account registered");
        let issued = self.tokens.issue(account.id)?;
        Ok(Session::new(issued, &account))
    }

    /// Unknown handle and wrong secret fail identically.
    pub async fn login(&self, handle: &str, secret: &str) -> Result<Session> {
        let Some(account) = self.accounts.find_by_handle(handle).await? else {
            // unknown handles pay for a full verification too
            self.hasher.verify_secret(secret, self.hasher.decoy_hash()).await;
            return Err(AppError::InvalidCredentials);
        };
        if !self.hasher.verify_secret(secret, &account.password_hash).await {
            tracing::debug!(account_id = %account.id, "rejected login");
            return Err(AppError::InvalidCredentials);
        }

        let now = Utc::now();
        let (account, _) = update_account(self.accounts.as_ref(), account.id, |a| {
            a.last_login = Some(now);
            Ok(())
        })
        .await?;

        let issued = self.tokens.issue(account.id)?;
        Ok(Session::new(issued, &account))
    }

    pub async fn profile(&self, handle: &str) -> Result<PublicProfile> {
        let account = self
            .accounts
            .find_by_handle(handle)
            .await?
            .ok_or_else(|| AppError::NotFound("account", handle.to_string()))?;
        Ok(PublicProfile {
            handle: account.handle,
            role: account.role,
            post_count: account.posts.len(),
            created_at: account.created_at,
        })
    }

    /// Removes the caller's posts, then the caller. Safe to repeat after a
    /// partial failure: whatever is already gone is skipped.
    pub async fn delete_self(&self, account_id: Uuid) -> Result<DeletionReport> {
        let posts_deleted = self.posts.delete_posts_by_author(account_id).await?;
        let accounts_deleted = u64::from(self.accounts.delete_account(account_id).await?);
        tracing::info!(account_id = %account_id, posts_deleted, accounts_deleted, "account self-deleted");
        Ok(DeletionReport {
            posts_deleted,
            accounts_deleted,
        })
    }

    /// Admin-only wipe of every post and account. Not atomic; re-issuing it
    /// finishes whatever a previous call left behind.
    pub async fn delete_all(&self, caller: &Account) -> Result<DeletionReport> {
        if !caller.is_admin() {
            return Err(AppError::Forbidden("deleting all accounts requires the admin role".into()));
        }
        let posts_deleted = self.posts.delete_all_posts().await?;
        let accounts_deleted = self.accounts.delete_all_accounts().await?;
        tracing::warn!(by = %caller.id, posts_deleted, accounts_deleted, "bulk deletion");
        Ok(DeletionReport {
            posts_deleted,
            accounts_deleted,
        })
    }
}
