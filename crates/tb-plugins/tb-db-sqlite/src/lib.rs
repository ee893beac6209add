//! # tb-db-sqlite Implementation
//!
//! This module implements the data mapping between SQLite rows and the
//! `tb-core` documents. Accounts and posts are two independent tables; the
//! list-valued fields (owned posts, vote history, voter ledger, milestones)
//! live in JSON columns so that each document is one row and every write is a
//! single-statement, version-checked `UPDATE`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tb_core::error::{AppError, Result};
use tb_core::milestone::status_of;
use tb_core::models::{Account, Category, Post, PostSort, Role};
use tb_core::traits::{AccountRepo, PostRepo};
use uuid::Uuid;

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS accounts (
        id            BLOB PRIMARY KEY,
        handle        TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        contact       TEXT UNIQUE,
        role          TEXT NOT NULL,
        posts         TEXT NOT NULL,
        votes         TEXT NOT NULL,
        created_at    TEXT NOT NULL,
        last_login    TEXT,
        version       INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS posts (
        id         BLOB PRIMARY KEY,
        author_id  BLOB NOT NULL,
        title      TEXT NOT NULL,
        content    TEXT NOT NULL,
        category   TEXT NOT NULL,
        upvotes    INTEGER NOT NULL,
        downvotes  INTEGER NOT NULL,
        score      INTEGER NOT NULL,
        voters     TEXT NOT NULL,
        milestones TEXT NOT NULL,
        status     TEXT NOT NULL,
        views      INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        version    INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS posts_by_author ON posts (author_id)",
    "CREATE INDEX IF NOT EXISTS posts_by_score ON posts (score DESC, created_at DESC)",
];

pub struct SqliteStore {
    pool: SqlitePool,
}

/// Maps driver failures onto the domain taxonomy. Anything that is not a
/// constraint or decoding problem is treated as the store being unavailable.
fn store_err(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            if db.message().contains("contact") {
                AppError::Conflict("contact address is already registered".into())
            } else {
                AppError::Conflict("handle is already taken".into())
            }
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => AppError::Internal(format!("row decoding failed: {e}")),
        _ => AppError::StoreUnavailable(e.to_string()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(format!("json encoding failed: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| AppError::Internal(format!("json column is corrupt: {e}")))
}

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let role: String = row.try_get("role").map_err(store_err)?;
    Ok(Account {
        id: row.try_get("id").map_err(store_err)?,
        handle: row.try_get("handle").map_err(store_err)?,
        password_hash: row.try_get("password_hash").map_err(store_err)?,
        contact: row.try_get("contact").map_err(store_err)?,
        role: Role::from_str(&role)?,
        posts: from_json(&row.try_get::<String, _>("posts").map_err(store_err)?)?,
        votes: from_json(&row.try_get::<String, _>("votes").map_err(store_err)?)?,
        created_at: row.try_get("created_at").map_err(store_err)?,
        last_login: row.try_get("last_login").map_err(store_err)?,
        version: row.try_get("version").map_err(store_err)?,
    })
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    let category: String = row.try_get("category").map_err(store_err)?;
    let milestones: Vec<tb_core::Milestone> =
        from_json(&row.try_get::<String, _>("milestones").map_err(store_err)?)?;
    Ok(Post {
        id: row.try_get("id").map_err(store_err)?,
        author_id: row.try_get("author_id").map_err(store_err)?,
        title: row.try_get("title").map_err(store_err)?,
        content: row.try_get("content").map_err(store_err)?,
        category: Category::from_str(&category)
            .map_err(|_| AppError::Internal(format!("unknown stored category '{category}'")))?,
        upvotes: row.try_get("upvotes").map_err(store_err)?,
        downvotes: row.try_get("downvotes").map_err(store_err)?,
        score: row.try_get("score").map_err(store_err)?,
        voters: from_json(&row.try_get::<String, _>("voters").map_err(store_err)?)?,
        // the stored column only serves queries; the status is always re-derived
        status: status_of(&milestones),
        milestones,
        views: row.try_get("views").map_err(store_err)?,
        created_at: row.try_get("created_at").map_err(store_err)?,
        updated_at: row.try_get("updated_at").map_err(store_err)?,
        version: row.try_get("version").map_err(store_err)?,
    })
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    ///
    /// `timeout` bounds both pool acquisition and SQLite's busy wait, so a
    /// stuck store fails the request with `StoreUnavailable` instead of hanging it.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(store_err)?
            .create_if_missing(true)
            .busy_timeout(timeout);

        // An in-memory database exists per connection, so it must be pinned to one.
        let in_memory = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(timeout);
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(8)
        };

        let pool = pool_options.connect_with(options).await.map_err(store_err)?;
        let store = Self { pool };
        store.migrate().await?;
        tracing::info!(url, "sqlite store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepo for SqliteStore {
    async fn insert_account(&self, account: Account) -> Result<()> {
        sqlx::query(
            "INSERT INTO accounts (id, handle, password_hash, contact, role, posts, votes, created_at, last_login, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(account.id)
        .bind(&account.handle)
        .bind(&account.password_hash)
        .bind(&account.contact)
        .bind(account.role.as_str())
        .bind(to_json(&account.posts)?)
        .bind(to_json(&account.votes)?)
        .bind(account.created_at)
        .bind(account.last_login)
        .bind(account.version)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE handle = ?")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn get_accounts(&self, ids: Vec<Uuid>) -> Result<Vec<Account>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM accounts WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?
            .iter()
            .map(account_from_row)
            .collect()
    }

    async fn replace_account(&self, account: Account, expected_version: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE accounts
             SET password_hash = ?, contact = ?, role = ?, posts = ?, votes = ?, last_login = ?,
                 version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(&account.password_hash)
        .bind(&account.contact)
        .bind(account.role.as_str())
        .bind(to_json(&account.posts)?)
        .bind(to_json(&account.votes)?)
        .bind(account.last_login)
        .bind(account.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.get_account(account.id).await? {
            Some(_) => Ok(false),
            None => Err(AppError::account_not_found(account.id)),
        }
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_accounts(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM accounts")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PostRepo for SqliteStore {
    async fn insert_post(&self, post: Post) -> Result<()> {
        sqlx::query(
            "INSERT INTO posts (id, author_id, title, content, category, upvotes, downvotes, score,
                                voters, milestones, status, views, created_at, updated_at, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.category.as_str())
        .bind(post.upvotes)
        .bind(post.downvotes)
        .bind(post.score)
        .bind(to_json(&post.voters)?)
        .bind(to_json(&post.milestones)?)
        .bind(post.status.as_str())
        .bind(post.views)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(post.version)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn replace_post(&self, post: Post, expected_version: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE posts
             SET title = ?, content = ?, category = ?, upvotes = ?, downvotes = ?, score = ?,
                 voters = ?, milestones = ?, status = ?, views = ?, updated_at = ?,
                 version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.category.as_str())
        .bind(post.upvotes)
        .bind(post.downvotes)
        .bind(post.score)
        .bind(to_json(&post.voters)?)
        .bind(to_json(&post.milestones)?)
        .bind(post.status.as_str())
        .bind(post.views)
        .bind(post.updated_at)
        .bind(post.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.get_post(post.id).await? {
            Some(_) => Ok(false),
            None => Err(AppError::post_not_found(post.id)),
        }
    }

    async fn increment_views(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(
            "UPDATE posts SET views = views + 1, version = version + 1 WHERE id = ? RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_posts(&self, sort: PostSort, offset: u64, limit: u64) -> Result<Vec<Post>> {
        let order = match sort {
            PostSort::Score => "score DESC, created_at DESC, id DESC",
            PostSort::Newest => "created_at DESC, id DESC",
            PostSort::Oldest => "created_at ASC, id ASC",
        };
        let limit = i64::try_from(limit)
            .map_err(|_| AppError::ValidationFailed(format!("limit {limit} is out of range")))?;
        let offset = i64::try_from(offset)
            .map_err(|_| AppError::ValidationFailed(format!("offset {offset} is out of range")))?;
        let sql = format!("SELECT * FROM posts ORDER BY {order} LIMIT ? OFFSET ?");
        sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?
            .iter()
            .map(post_from_row)
            .collect()
    }

    async fn count_posts(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        u64::try_from(count).map_err(|_| AppError::Internal(format!("negative post count {count}")))
    }

    async fn posts_with_milestones(&self) -> Result<Vec<Post>> {
        sqlx::query("SELECT * FROM posts WHERE status <> 'active'")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?
            .iter()
            .map(post_from_row)
            .collect()
    }

    async fn delete_posts_by_author(&self, author_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM posts WHERE author_id = ?")
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_all_posts(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM posts")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }
}
