//! # Domain Models
//!
//! These structs represent the core entities of Tallyboard.
//! We use UUID v7 for time-ordered, globally unique identification.
//! Accounts and posts are stored as two independent documents; each carries a
//! `version` that stores bump on every successful compare-and-swap write.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::milestone::{Milestone, PostStatus};

/// Which way a vote points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(AppError::ValidationFailed(format!(
                "direction must be 'up' or 'down', got '{other}'"
            ))),
        }
    }
}

/// Capability attached to an account. Admins may trigger milestone actions
/// and bulk-delete accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Internal(format!("unknown role '{other}'"))),
        }
    }
}

/// Topic bucket a post is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tech,
    Business,
    Social,
    Entertainment,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tech => "tech",
            Category::Business => "business",
            Category::Social => "social",
            Category::Entertainment => "entertainment",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tech" => Ok(Category::Tech),
            "business" => Ok(Category::Business),
            "social" => Ok(Category::Social),
            "entertainment" => Ok(Category::Entertainment),
            "other" => Ok(Category::Other),
            other => Err(AppError::ValidationFailed(format!("invalid category '{other}'"))),
        }
    }
}

/// One entry of a post's voter ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub account_id: Uuid,
    pub direction: Direction,
}

/// One entry of an account's personal vote history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub post_id: Uuid,
    pub direction: Direction,
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub handle: String,
    /// Argon2 PHC string; the clear-text secret is never stored.
    pub password_hash: String,
    pub contact: Option<String>,
    pub role: Role,
    /// Posts authored by this account, oldest first.
    pub posts: Vec<Uuid>,
    /// Mirror of the ledgers this account appears in. At most one record per post.
    pub votes: Vec<VoteRecord>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Account {
    pub fn new(
        handle: String,
        password_hash: String,
        contact: Option<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            handle,
            password_hash,
            contact,
            role,
            posts: Vec::new(),
            votes: Vec::new(),
            created_at: now,
            last_login: None,
            version: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The direction this account has on record for `post_id`, if any.
    pub fn vote_on(&self, post_id: Uuid) -> Option<Direction> {
        self.votes
            .iter()
            .find(|v| v.post_id == post_id)
            .map(|v| v.direction)
    }
}

/// The projection of an account that may leave the process: no secret, no history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: Uuid,
    pub handle: String,
    pub contact: Option<String>,
    pub role: Role,
    pub post_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            handle: account.handle.clone(),
            contact: account.contact.clone(),
            role: account.role,
            post_count: account.posts.len(),
            created_at: account.created_at,
            last_login: account.last_login,
        }
    }
}

/// A text post with its tally, ledger and milestone state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub upvotes: i64,
    pub downvotes: i64,
    /// Always `upvotes - downvotes`; see [`Post::recompute_score`].
    pub score: i64,
    pub voters: Vec<LedgerEntry>,
    pub milestones: Vec<Milestone>,
    pub status: PostStatus,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Post {
    pub fn new(
        author_id: Uuid,
        title: String,
        content: String,
        category: Category,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            author_id,
            title,
            content,
            category,
            upvotes: 0,
            downvotes: 0,
            score: 0,
            voters: Vec::new(),
            milestones: Vec::new(),
            status: PostStatus::Active,
            views: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn recompute_score(&mut self) {
        self.score = self.upvotes - self.downvotes;
    }

    /// The direction `account_id` has in this post's ledger, if any.
    pub fn vote_of(&self, account_id: Uuid) -> Option<Direction> {
        self.voters
            .iter()
            .find(|e| e.account_id == account_id)
            .map(|e| e.direction)
    }
}

/// Ordering for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    /// Highest score first, ties broken by newest.
    #[default]
    Score,
    Newest,
    Oldest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_creation_v7() {
        let author = Uuid::now_v7();
        let post = Post::new(
            author,
            "Hello".into(),
            "Hello Rust, again!".into(),
            Category::Tech,
            Utc::now(),
        );
        assert_eq!(post.author_id, author);
        assert_eq!(post.score, 0);
        assert_eq!(post.status, PostStatus::Active);
        assert!(post.voters.is_empty());
        assert_eq!(post.id.get_version_num(), 7);
    }

    #[test]
    fn summary_never_carries_the_secret() {
        let account = Account::new(
            "alice".into(),
            "$argon2id$v=19$secret".into(),
            None,
            Role::Member,
            Utc::now(),
        );
        let json = serde_json::to_string(&AccountSummary::from(&account)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"postCount\":0"));
    }

    #[test]
    fn direction_parsing_rejects_unknown_values() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert!(matches!(
            "sideways".parse::<Direction>(),
            Err(AppError::ValidationFailed(_))
        ));
    }
}
