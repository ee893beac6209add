//! Milestone action dispatch and the cross-post milestone listing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tb_core::error::{AppError, Result};
use tb_core::milestone::action_for;
use tb_core::traits::{AccountRepo, PostRepo};
use uuid::Uuid;

use crate::retry::update_post;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredAction {
    pub post_id: Uuid,
    pub threshold: i64,
    pub action: &'static str,
    pub triggered_at: DateTime<Utc>,
}

/// Fires the external action bound to a reached milestone, once.
pub struct MilestoneDispatcher {
    posts: Arc<dyn PostRepo>,
}

impl MilestoneDispatcher {
    pub fn new(posts: Arc<dyn PostRepo>) -> Self {
        Self { posts }
    }

    /// Marks the milestone triggered and returns its action.
    ///
    /// An already-triggered milestone fails with `AlreadyTriggered` whoever
    /// asks. The flag is set through a version-checked write, so of two racing
    /// calls exactly one succeeds.
    pub async fn trigger(
        &self,
        post_id: Uuid,
        threshold: i64,
        caller_is_privileged: bool,
    ) -> Result<TriggeredAction> {
        update_post(self.posts.as_ref(), post_id, |post| {
            let record = post.milestones.iter_mut().find(|m| m.threshold == threshold);
            match record {
                Some(m) if m.action_triggered => Err(AppError::AlreadyTriggered { post_id, threshold }),
                _ if !caller_is_privileged => Err(AppError::Forbidden(
                    "triggering milestone actions requires the admin role".into(),
                )),
                Some(m) if m.reached => {
                    m.action_triggered = true;
                    Ok(())
                }
                _ => Err(AppError::NotFound(
                    "milestone",
                    format!("{threshold} (not reached on post {post_id})"),
                )),
            }
        })
        .await?;

        let action = action_for(threshold);
        tracing::info!(post_id = %post_id, threshold, action, "milestone action triggered");
        Ok(TriggeredAction {
            post_id,
            threshold,
            action,
            triggered_at: Utc::now(),
        })
    }
}

/// One reached milestone of one post.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRow {
    pub post_id: Uuid,
    pub post_title: String,
    pub author_id: Uuid,
    /// `None` when the author account no longer exists.
    pub author_handle: Option<String>,
    pub threshold: i64,
    pub reached_at: Option<DateTime<Utc>>,
    pub action_triggered: bool,
    pub upvotes: i64,
}

/// Read-only flattening of every reached milestone across all posts.
pub struct MilestoneListing {
    posts: Arc<dyn PostRepo>,
    accounts: Arc<dyn AccountRepo>,
}

impl MilestoneListing {
    pub fn new(posts: Arc<dyn PostRepo>, accounts: Arc<dyn AccountRepo>) -> Self {
        Self { posts, accounts }
    }

    /// Most recently reached first.
    pub async fn list(&self) -> Result<Vec<MilestoneRow>> {
        let posts = self.posts.posts_with_milestones().await?;

        let mut author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let handles: HashMap<Uuid, String> = self
            .accounts
            .get_accounts(author_ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a.handle))
            .collect();

        let mut rows: Vec<MilestoneRow> = posts
            .iter()
            .flat_map(|post| {
                let handle = handles.get(&post.author_id).cloned();
                post.milestones
                    .iter()
                    .filter(|m| m.reached)
                    .map(move |m| MilestoneRow {
                        post_id: post.id,
                        post_title: post.title.clone(),
                        author_id: post.author_id,
                        author_handle: handle.clone(),
                        threshold: m.threshold,
                        reached_at: m.reached_at,
                        action_triggered: m.action_triggered,
                        upvotes: post.upvotes,
                    })
            })
            .collect();

        // None sorts below Some, so undated rows land last.
        rows.sort_by(|a, b| b.reached_at.cmp(&a.reached_at));
        Ok(rows)
    }
}
