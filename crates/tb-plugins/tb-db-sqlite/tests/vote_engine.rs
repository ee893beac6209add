use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tb_core::milestone::PostStatus;
use tb_core::models::{Account, Category, Direction, Post, Role};
use tb_core::traits::{AccountRepo, PostRepo};
use tb_core::VoteOutcome;
use tb_db_sqlite::SqliteStore;
use tb_services::VoteEngine;
use tempfile::TempDir;
use uuid::Uuid;

/// File-backed store so the pool really hands out several connections.
async fn file_store(dir: &TempDir) -> Arc<SqliteStore> {
    let url = format!("sqlite://{}", dir.path().join("tally.db").display());
    Arc::new(SqliteStore::connect(&url, Duration::from_secs(5)).await.unwrap())
}

async fn seed_account(store: &SqliteStore, handle: &str) -> Account {
    let account = Account::new(handle.into(), "hash".into(), None, Role::Member, Utc::now());
    store.insert_account(account.clone()).await.unwrap();
    account
}

async fn seed_post(store: &SqliteStore) -> Post {
    let post = Post::new(
        Uuid::now_v7(),
        "Stored on disk".into(),
        "A post that lives in a sqlite file".into(),
        Category::Tech,
        Utc::now(),
    );
    store.insert_post(post.clone()).await.unwrap();
    post
}

#[tokio::test]
async fn toggle_and_change_persist_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let engine = VoteEngine::new(store.clone(), store.clone());
    let post = seed_post(&store).await;
    let alice = seed_account(&store, "alice").await;

    let r = engine.apply_vote(alice.id, post.id, Direction::Up).await.unwrap();
    assert_eq!((r.upvotes, r.score, r.outcome), (1, 1, VoteOutcome::Cast));

    let r = engine.apply_vote(alice.id, post.id, Direction::Up).await.unwrap();
    assert_eq!((r.upvotes, r.score, r.outcome), (0, 0, VoteOutcome::Withdrawn));
    assert!(store.get_account(alice.id).await.unwrap().unwrap().votes.is_empty());

    engine.apply_vote(alice.id, post.id, Direction::Up).await.unwrap();
    let r = engine.apply_vote(alice.id, post.id, Direction::Down).await.unwrap();
    assert_eq!(r.outcome, VoteOutcome::Changed);

    let stored = store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!((stored.upvotes, stored.downvotes, stored.score), (0, 1, -1));
    assert_eq!(stored.voters.len(), 1);
    let account = store.get_account(alice.id).await.unwrap().unwrap();
    assert_eq!(account.vote_on(post.id), Some(Direction::Down));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_voters_keep_tally_ledger_and_mirror_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let engine = Arc::new(VoteEngine::new(store.clone(), store.clone()));
    let post = seed_post(&store).await;

    let mut voters = Vec::new();
    for i in 0..24 {
        voters.push(seed_account(&store, &format!("crowd-{i}")).await);
    }

    let mut tasks = Vec::new();
    for (i, voter) in voters.iter().enumerate() {
        let engine = engine.clone();
        let (voter_id, post_id) = (voter.id, post.id);
        let direction = if i % 4 == 0 { Direction::Down } else { Direction::Up };
        tasks.push(tokio::spawn(async move {
            loop {
                match engine.apply_vote(voter_id, post_id, direction).await {
                    Err(e) if e.is_retryable() => continue,
                    other => break other,
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!((stored.upvotes, stored.downvotes), (18, 6));
    assert_eq!(stored.score, 12);
    assert_eq!(stored.voters.len(), 24);
    assert_eq!(stored.status, PostStatus::Milestone10);
    assert!(stored.milestones.iter().any(|m| m.threshold == 10 && m.reached));

    for voter in &voters {
        let account = store.get_account(voter.id).await.unwrap().unwrap();
        assert_eq!(account.votes.len(), 1);
        assert_eq!(account.vote_on(post.id), stored.vote_of(voter.id));
    }
}
