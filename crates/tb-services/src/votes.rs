//! # Vote Engine
//!
//! Applies a vote as two sequential single-document writes: the post (ledger,
//! tally, score, milestones) first, then the voter's personal history. There is
//! no transaction spanning the two. If the second write fails the post keeps
//! the vote and the account does not; that dangling vote is reported as
//! `VoteNotMirrored` and left for an out-of-band reconciliation sweep.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tb_core::error::{AppError, Result};
use tb_core::ledger::{self, VoteOutcome};
use tb_core::milestone::PostStatus;
use tb_core::models::{Direction, Post};
use tb_core::traits::{AccountRepo, PostRepo};
use uuid::Uuid;

use crate::retry::{update_account, update_post};

/// What the caller gets back after a vote.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub post_id: Uuid,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    pub status: PostStatus,
    pub outcome: VoteOutcome,
    /// The caller's vote after this call; `None` once withdrawn.
    pub your_vote: Option<Direction>,
    pub milestones_updated: bool,
    /// Thresholds that went from not-reached to reached in this call.
    pub new_milestones: Vec<i64>,
}

pub struct VoteEngine {
    posts: Arc<dyn PostRepo>,
    accounts: Arc<dyn AccountRepo>,
}

impl VoteEngine {
    pub fn new(posts: Arc<dyn PostRepo>, accounts: Arc<dyn AccountRepo>) -> Self {
        Self { posts, accounts }
    }

    pub async fn apply_vote(
        &self,
        actor: Uuid,
        post_id: Uuid,
        direction: Direction,
    ) -> Result<VoteResult> {
        if self.accounts.get_account(actor).await?.is_none() {
            return Err(AppError::account_not_found(actor));
        }

        // First write: the post document. A failure here leaves both documents untouched.
        let (post, effect) = update_post(self.posts.as_ref(), post_id, |post| {
            let before = reached_thresholds(post);
            let effect = ledger::apply_to_post(post, actor, direction, Utc::now());
            let newly = reached_thresholds(post)
                .into_iter()
                .filter(|t| !before.contains(t))
                .collect::<Vec<_>>();
            Ok((effect, newly))
        })
        .await?;
        let (effect, new_milestones) = effect;

        tracing::info!(
            post_id = %post_id,
            account_id = %actor,
            direction = %direction,
            outcome = ?effect.outcome,
            upvotes = post.upvotes,
            downvotes = post.downvotes,
            "vote applied to post"
        );
        if effect.milestones_updated {
            tracing::info!(post_id = %post_id, thresholds = ?new_milestones, status = post.status.as_str(), "milestone reached");
        }

        // Second write: the voter's mirror. Never swallowed, never retried into the post.
        if let Err(e) = update_account(self.accounts.as_ref(), actor, |account| {
            Ok(ledger::apply_to_account(account, effect.mirror))
        })
        .await
        {
            tracing::error!(
                post_id = %post_id,
                account_id = %actor,
                error = %e,
                "dangling vote: post updated but voter history was not"
            );
            return Err(AppError::VoteNotMirrored {
                post_id,
                account_id: actor,
                reason: e.to_string(),
            });
        }

        Ok(VoteResult {
            post_id,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            score: post.score,
            status: post.status,
            outcome: effect.outcome,
            your_vote: post.vote_of(actor),
            milestones_updated: effect.milestones_updated,
            new_milestones,
        })
    }
}

fn reached_thresholds(post: &Post) -> Vec<i64> {
    post.milestones
        .iter()
        .filter(|m| m.reached)
        .map(|m| m.threshold)
        .collect()
}
