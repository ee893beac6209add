#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tb_auth_jwt::JwtTokenService;
use tb_core::error::Result;
use tb_core::models::{Account, Category, Post, Role};
use tb_core::traits::{AccountRepo, CredentialHasher, PostRepo};
use tb_db_memory::MemoryStore;
use tb_services::Services;
use uuid::Uuid;

/// Stand-in for Argon2 so tests that register many accounts stay fast.
pub struct PlainHasher;

#[async_trait]
impl CredentialHasher for PlainHasher {
    async fn hash_secret(&self, secret: &str) -> Result<String> {
        Ok(format!("plain:{secret}"))
    }

    async fn verify_secret(&self, secret: &str, hash: &str) -> bool {
        hash == format!("plain:{secret}")
    }

    fn decoy_hash(&self) -> &'static str {
        "plain-decoy"
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub services: Services,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let services = Services::new(
        store.clone(),
        store.clone(),
        Arc::new(JwtTokenService::new(b"integration-test-secret", Duration::hours(24))),
        Arc::new(PlainHasher),
        vec!["root".to_string()],
    );
    Harness { store, services }
}

pub async fn seed_account(store: &MemoryStore, handle: &str, role: Role) -> Account {
    let account = Account::new(handle.into(), "plain:Secret123".into(), None, role, Utc::now());
    store.insert_account(account.clone()).await.unwrap();
    account
}

pub async fn seed_post(store: &MemoryStore, author: Uuid) -> Post {
    let post = Post::new(
        author,
        "A seeded post".into(),
        "Seeded body for tests".into(),
        Category::Tech,
        Utc::now(),
    );
    store.insert_post(post.clone()).await.unwrap();
    post
}
