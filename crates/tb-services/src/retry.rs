//! Optimistic read-modify-write loops over the stores' version-checked replace.
//!
//! Each loop reads the document, lets the caller mutate a copy, and writes it
//! back only if nobody else wrote in between. On a version mismatch the whole
//! cycle repeats against the fresh document, so concurrent writers never lose
//! each other's updates.

use tb_core::error::{AppError, Result};
use tb_core::models::{Account, Post};
use tb_core::traits::{AccountRepo, PostRepo};
use uuid::Uuid;

/// Attempts before contention is reported as `StoreUnavailable`.
pub const MAX_ATTEMPTS: usize = 16;

/// Applies `mutate` to post `id` and persists it. An error from `mutate`
/// aborts the loop without writing.
pub async fn update_post<T, F>(posts: &dyn PostRepo, id: Uuid, mut mutate: F) -> Result<(Post, T)>
where
    F: FnMut(&mut Post) -> Result<T>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let Some(mut post) = posts.get_post(id).await? else {
            return Err(AppError::post_not_found(id));
        };
        let expected = post.version;
        let out = mutate(&mut post)?;
        if posts.replace_post(post.clone(), expected).await? {
            post.version = expected + 1;
            return Ok((post, out));
        }
        tracing::debug!(post_id = %id, attempt, "post changed underneath us, retrying");
    }
    Err(AppError::StoreUnavailable(format!(
        "post {id} still contended after {MAX_ATTEMPTS} attempts"
    )))
}

/// Account counterpart of [`update_post`].
pub async fn update_account<T, F>(
    accounts: &dyn AccountRepo,
    id: Uuid,
    mut mutate: F,
) -> Result<(Account, T)>
where
    F: FnMut(&mut Account) -> Result<T>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let Some(mut account) = accounts.get_account(id).await? else {
            return Err(AppError::account_not_found(id));
        };
        let expected = account.version;
        let out = mutate(&mut account)?;
        if accounts.replace_account(account.clone(), expected).await? {
            account.version = expected + 1;
            return Ok((account, out));
        }
        tracing::debug!(account_id = %id, attempt, "account changed underneath us, retrying");
    }
    Err(AppError::StoreUnavailable(format!(
        "account {id} still contended after {MAX_ATTEMPTS} attempts"
    )))
}
