mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{seed_account, seed_post};
use tb_core::error::AppError;
use tb_core::milestone::Milestone;
use tb_core::models::{Category, Post, Role};
use tb_core::traits::{AccountRepo, PostRepo};
use tb_db_memory::MemoryStore;
use tb_services::{MilestoneDispatcher, MilestoneListing};
use uuid::Uuid;

fn reached(threshold: i64, minutes_ago: i64) -> Milestone {
    Milestone {
        threshold,
        reached: true,
        reached_at: Some(Utc::now() - Duration::minutes(minutes_ago)),
        action_triggered: false,
    }
}

async fn post_with(store: &MemoryStore, author: Uuid, upvotes: i64, milestones: Vec<Milestone>) -> Post {
    let mut post = Post::new(
        author,
        "Milestone post".into(),
        "A post that already earned some upvotes".into(),
        Category::Business,
        Utc::now(),
    );
    post.upvotes = upvotes;
    post.recompute_score();
    post.status = tb_core::milestone::status_of(&milestones);
    post.milestones = milestones;
    store.insert_post(post.clone()).await.unwrap();
    post
}

#[tokio::test]
async fn members_cannot_trigger() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = MilestoneDispatcher::new(store.clone());
    let post = post_with(&store, Uuid::now_v7(), 12, vec![reached(10, 5)]).await;

    let err = dispatcher.trigger(post.id, 10, false).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let stored = store.get_post(post.id).await.unwrap().unwrap();
    assert!(!stored.milestones[0].action_triggered);
}

#[tokio::test]
async fn admin_triggers_once_then_everyone_sees_already_triggered() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = MilestoneDispatcher::new(store.clone());
    let post = post_with(&store, Uuid::now_v7(), 12, vec![reached(10, 5)]).await;

    let fired = dispatcher.trigger(post.id, 10, true).await.unwrap();
    assert_eq!(fired.action, "consultation scheduled");
    assert_eq!((fired.post_id, fired.threshold), (post.id, 10));

    let again = dispatcher.trigger(post.id, 10, true).await;
    assert!(matches!(
        again,
        Err(AppError::AlreadyTriggered { threshold: 10, .. })
    ));
    // a member learns it already fired before being told it is forbidden
    let member = dispatcher.trigger(post.id, 10, false).await;
    assert!(matches!(member, Err(AppError::AlreadyTriggered { .. })));

    let stored = store.get_post(post.id).await.unwrap().unwrap();
    assert!(stored.milestones[0].action_triggered);
}

#[tokio::test]
async fn unreached_threshold_and_missing_post_are_not_found() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = MilestoneDispatcher::new(store.clone());
    let post = post_with(&store, Uuid::now_v7(), 12, vec![reached(10, 5)]).await;

    let unreached = dispatcher.trigger(post.id, 100, true).await;
    assert!(matches!(unreached, Err(AppError::NotFound("milestone", _))));

    let missing = dispatcher.trigger(Uuid::now_v7(), 10, true).await;
    assert!(matches!(missing, Err(AppError::NotFound("post", _))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_triggers_fire_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(MilestoneDispatcher::new(store.clone()));
    let post = post_with(&store, Uuid::now_v7(), 120, vec![reached(10, 9), reached(100, 1)]).await;

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let dispatcher = dispatcher.clone();
        let post_id = post.id;
        tasks.push(tokio::spawn(async move {
            dispatcher.trigger(post_id, 100, true).await
        }));
    }

    let mut fired = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(action) => {
                assert_eq!(action.action, "incorporation paperwork initiated");
                fired += 1;
            }
            Err(AppError::AlreadyTriggered { .. }) => rejected += 1,
            Err(e) if e.is_retryable() => {}
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(fired, 1);
    assert!(rejected <= 11);

    let stored = store.get_post(post.id).await.unwrap().unwrap();
    let hundred = stored.milestones.iter().find(|m| m.threshold == 100).unwrap();
    assert!(hundred.action_triggered);
}

#[tokio::test]
async fn listing_flattens_reached_milestones_newest_first() {
    let store = Arc::new(MemoryStore::new());
    let listing = MilestoneListing::new(store.clone(), store.clone());
    let author = seed_account(&store, "founder", Role::Member).await;

    // no milestones contributes no rows
    seed_post(&store, author.id).await;
    assert!(listing.list().await.unwrap().is_empty());

    let post = post_with(&store, author.id, 140, vec![reached(10, 30), reached(100, 2)]).await;
    let rows = listing.list().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].threshold, 100);
    assert_eq!(rows[1].threshold, 10);
    assert!(rows.iter().all(|r| r.post_id == post.id && r.upvotes == 140));
    assert!(rows.iter().all(|r| r.author_handle.as_deref() == Some("founder")));
    assert_eq!(rows[0].post_title, "Milestone post");
}

#[tokio::test]
async fn listing_survives_a_deleted_author() {
    let store = Arc::new(MemoryStore::new());
    let listing = MilestoneListing::new(store.clone(), store.clone());
    let author = seed_account(&store, "gone", Role::Member).await;
    post_with(&store, author.id, 11, vec![reached(10, 1)]).await;

    store.delete_account(author.id).await.unwrap();

    let rows = listing.list().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].author_id, author.id);
    assert_eq!(rows[0].author_handle, None);
}
