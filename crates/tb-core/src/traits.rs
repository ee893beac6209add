//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//!
//! Stores hold whole documents. The only write primitive for an existing
//! document is a version-checked replace: it succeeds only if nobody wrote the
//! document since it was read, and bumps `version` when it does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Account, Post, PostSort};

/// Persistence contract for accounts.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Fails with `Conflict` when the handle or contact address is taken.
    async fn insert_account(&self, account: Account) -> Result<()>;
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>>;
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Account>>;
    /// Missing ids are skipped.
    async fn get_accounts(&self, ids: Vec<Uuid>) -> Result<Vec<Account>>;

    /// Writes `account` if the stored version is still `expected_version`.
    /// Returns `Ok(false)` on a version mismatch and `NotFound` if the account is gone.
    async fn replace_account(&self, account: Account, expected_version: i64) -> Result<bool>;

    /// Returns whether anything was deleted; deleting twice is not an error.
    async fn delete_account(&self, id: Uuid) -> Result<bool>;
    async fn delete_all_accounts(&self) -> Result<u64>;
}

/// Persistence contract for posts.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn insert_post(&self, post: Post) -> Result<()>;
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>>;

    /// Writes `post` if the stored version is still `expected_version`.
    /// Returns `Ok(false)` on a version mismatch and `NotFound` if the post is gone.
    async fn replace_post(&self, post: Post, expected_version: i64) -> Result<bool>;

    /// Atomically bumps the view counter and returns the updated post.
    async fn increment_views(&self, id: Uuid) -> Result<Option<Post>>;

    async fn list_posts(&self, sort: PostSort, offset: u64, limit: u64) -> Result<Vec<Post>>;
    async fn count_posts(&self) -> Result<u64>;

    /// Every post with at least one reached milestone.
    async fn posts_with_milestones(&self) -> Result<Vec<Post>>;

    async fn delete_posts_by_author(&self, author_id: Uuid) -> Result<u64>;
    async fn delete_all_posts(&self) -> Result<u64>;
}

/// A freshly signed bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateless identity tokens.
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait TokenService: Send + Sync {
    fn issue(&self, account_id: Uuid) -> Result<IssuedToken>;

    /// Checks signature and expiry only; `InvalidToken` or `Expired` on failure.
    /// Callers must still resolve the id against the live account store.
    fn verify(&self, token: &str) -> Result<Uuid>;
}

/// One-way hashing of account secrets.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_secret(&self, secret: &str) -> Result<String>;
    async fn verify_secret(&self, secret: &str, hash: &str) -> bool;
    /// A well-formed hash that matches no secret. Verifying against it costs
    /// the same as a real check.
    fn decoy_hash(&self) -> &'static str;
}
