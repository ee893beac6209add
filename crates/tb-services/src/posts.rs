//! Post creation and the read paths over posts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tb_core::error::{AppError, Result};
use tb_core::milestone::{Milestone, PostStatus};
use tb_core::models::{Account, Category, Direction, Post, PostSort};
use tb_core::traits::{AccountRepo, PostRepo};
use uuid::Uuid;

use crate::retry::update_account;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 50;

/// Already-validated post payload.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    pub id: Uuid,
    pub handle: Option<String>,
}

/// A post as returned to clients: no voter ledger, author resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub author: AuthorRef,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    pub status: PostStatus,
    pub milestones: Vec<Milestone>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_vote: Option<Direction>,
}

impl PostView {
    fn new(post: Post, handle: Option<String>, viewer: Option<&Account>) -> Self {
        let your_vote = viewer.and_then(|v| post.vote_of(v.id));
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            category: post.category,
            author: AuthorRef {
                id: post.author_id,
                handle,
            },
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            score: post.score,
            status: post.status,
            milestones: post.milestones,
            views: post.views,
            created_at: post.created_at,
            updated_at: post.updated_at,
            your_vote,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort: PostSort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: u64,
    pub pages: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    fn new(current: u64, limit: u64, total: u64) -> Self {
        let pages = total.div_ceil(limit);
        Self {
            current,
            pages,
            total,
            has_next: current < pages,
            has_prev: current > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    pub posts: Vec<PostView>,
    pub pagination: Pagination,
}

pub struct PostService {
    posts: Arc<dyn PostRepo>,
    accounts: Arc<dyn AccountRepo>,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepo>, accounts: Arc<dyn AccountRepo>) -> Self {
        Self { posts, accounts }
    }

    pub async fn create(&self, author: &Account, new: NewPost) -> Result<PostView> {
        let post = Post::new(
            author.id,
            new.title,
            new.content,
            new.category.unwrap_or_default(),
            Utc::now(),
        );
        self.posts.insert_post(post.clone()).await?;
        tracing::info!(post_id = %post.id, author_id = %author.id, "post created");

        // The owned-posts list is a convenience index; the post itself is already durable.
        let post_id = post.id;
        if let Err(e) = update_account(self.accounts.as_ref(), author.id, |a| {
            if !a.posts.contains(&post_id) {
                a.posts.push(post_id);
            }
            Ok(())
        })
        .await
        {
            tracing::warn!(post_id = %post_id, author_id = %author.id, error = %e, "post not attached to author");
        }

        Ok(PostView::new(post, Some(author.handle.clone()), Some(author)))
    }

    /// Counts a view and returns the post; `viewer` sees their own vote.
    pub async fn get(&self, id: Uuid, viewer: Option<&Account>) -> Result<PostView> {
        let post = self
            .posts
            .increment_views(id)
            .await?
            .ok_or_else(|| AppError::post_not_found(id))?;
        let handle = self
            .accounts
            .get_account(post.author_id)
            .await?
            .map(|a| a.handle);
        Ok(PostView::new(post, handle, viewer))
    }

    pub async fn list(&self, query: ListQuery, viewer: Option<&Account>) -> Result<PostPage> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::ValidationFailed(format!("page {page} is out of range")))?;

        let total = self.posts.count_posts().await?;
        let posts = self.posts.list_posts(query.sort, offset, limit).await?;

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

        let posts = posts
            .into_iter()
            .map(|p| {
                let handle = handles.get(&p.author_id).cloned();
                PostView::new(p, handle, viewer)
            })
            .collect();

        Ok(PostPage {
            posts,
            pagination: Pagination::new(page, limit, total),
        })
    }
}
