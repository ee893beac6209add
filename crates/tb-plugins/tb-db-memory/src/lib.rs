//! # tb-db-memory
//!
//! In-process implementation of `AccountRepo` and `PostRepo` on `DashMap`.
//! Each document lives under its own key; a write holds that key's shard lock
//! for the duration of the version check, which makes the compare-and-swap
//! atomic per document. Nothing survives a restart.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tb_core::error::{AppError, Result};
use tb_core::models::{Account, Post, PostSort};
use tb_core::traits::{AccountRepo, PostRepo};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    accounts: DashMap<Uuid, Account>,
    /// handle -> account id
    handles: DashMap<String, Uuid>,
    /// contact address -> account id
    contacts: DashMap<String, Uuid>,
    posts: DashMap<Uuid, Post>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn release_indexes(&self, account: &Account) {
        self.handles.remove_if(&account.handle, |_, id| *id == account.id);
        if let Some(contact) = &account.contact {
            self.contacts.remove_if(contact, |_, id| *id == account.id);
        }
    }
}

#[async_trait]
impl AccountRepo for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<()> {
        match self.handles.entry(account.handle.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict(format!(
                    "handle '{}' is already taken",
                    account.handle
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(account.id);
            }
        }

        if let Some(contact) = &account.contact {
            match self.contacts.entry(contact.clone()) {
                Entry::Occupied(_) => {
                    self.handles.remove(&account.handle);
                    return Err(AppError::Conflict(
                        "contact address is already registered".into(),
                    ));
                }
                Entry::Vacant(slot) => {
                    slot.insert(account.id);
                }
            }
        }

        self.accounts.insert(account.id, account);
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<Account>> {
        let Some(id) = self.handles.get(handle).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn get_accounts(&self, ids: Vec<Uuid>) -> Result<Vec<Account>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.accounts.get(id).map(|a| a.clone()))
            .collect())
    }

    async fn replace_account(&self, mut account: Account, expected_version: i64) -> Result<bool> {
        let Some(mut slot) = self.accounts.get_mut(&account.id) else {
            return Err(AppError::account_not_found(account.id));
        };
        if slot.version != expected_version {
            return Ok(false);
        }
        account.version = expected_version + 1;
        *slot = account;
        Ok(true)
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool> {
        match self.accounts.remove(&id) {
            Some((_, account)) => {
                self.release_indexes(&account);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes the accounts present when the call starts, each together with
    /// its own index entries. Accounts registered meanwhile are left intact.
    async fn delete_all_accounts(&self) -> Result<u64> {
        let ids: Vec<Uuid> = self.accounts.iter().map(|a| *a.key()).collect();
        let mut count = 0;
        for id in ids {
            if let Some((_, account)) = self.accounts.remove(&id) {
                self.release_indexes(&account);
                count += 1;
            }
        }
        tracing::debug!(count, "cleared in-memory accounts");
        Ok(count)
    }
}

#[async_trait]
impl PostRepo for MemoryStore {
    async fn insert_post(&self, post: Post) -> Result<()> {
        match self.posts.entry(post.id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!("post {} already exists", post.id))),
            Entry::Vacant(slot) => {
                slot.insert(post);
                Ok(())
            }
        }
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(self.posts.get(&id).map(|p| p.clone()))
    }

    async fn replace_post(&self, mut post: Post, expected_version: i64) -> Result<bool> {
        let Some(mut slot) = self.posts.get_mut(&post.id) else {
            return Err(AppError::post_not_found(post.id));
        };
        if slot.version != expected_version {
            return Ok(false);
        }
        post.version = expected_version + 1;
        *slot = post;
        Ok(true)
    }

    async fn increment_views(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(self.posts.get_mut(&id).map(|mut post| {
            post.views += 1;
            post.version += 1;
            post.clone()
        }))
    }

    async fn list_posts(&self, sort: PostSort, offset: u64, limit: u64) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.posts.iter().map(|p| p.value().clone()).collect();
        match sort {
            PostSort::Score => posts.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then_with(|| (b.created_at, b.id).cmp(&(a.created_at, a.id)))
            }),
            PostSort::Newest => posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id))),
            PostSort::Oldest => posts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id))),
        }
        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_posts(&self) -> Result<u64> {
        Ok(self.posts.len() as u64)
    }

    async fn posts_with_milestones(&self) -> Result<Vec<Post>> {
        Ok(self
            .posts
            .iter()
            .filter(|p| p.milestones.iter().any(|m| m.reached))
            .map(|p| p.value().clone())
            .collect())
    }

    async fn delete_posts_by_author(&self, author_id: Uuid) -> Result<u64> {
        let mut removed = 0;
        self.posts.retain(|_, post| {
            let keep = post.author_id != author_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn delete_all_posts(&self) -> Result<u64> {
        let count = self.posts.len() as u64;
        self.posts.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tb_core::models::{Category, Role};

    fn account(handle: &str, contact: Option<&str>) -> Account {
        Account::new(
            handle.into(),
            "hash".into(),
            contact.map(Into::into),
            Role::Member,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn duplicate_handle_or_contact_conflicts() {
        let store = MemoryStore::new();
        store.insert_account(account("alice", Some("a@example.com"))).await.unwrap();

        let dup_handle = store.insert_account(account("alice", None)).await;
        assert!(matches!(dup_handle, Err(AppError::Conflict(_))));

        let dup_contact = store
            .insert_account(account("alicia", Some("a@example.com")))
            .await;
        assert!(matches!(dup_contact, Err(AppError::Conflict(_))));
        // the failed insert must not keep its handle reserved
        assert!(store.find_by_handle("alicia").await.unwrap().is_none());
        store.insert_account(account("alicia", None)).await.unwrap();
    }

    #[tokio::test]
    async fn stale_version_is_refused() {
        let store = MemoryStore::new();
        let post = Post::new(
            Uuid::now_v7(),
            "Title".into(),
            "Body text here".into(),
            Category::Other,
            Utc::now(),
        );
        store.insert_post(post.clone()).await.unwrap();

        let mut first = post.clone();
        first.upvotes = 1;
        assert!(store.replace_post(first, 0).await.unwrap());

        let mut stale = post.clone();
        stale.downvotes = 1;
        assert!(!store.replace_post(stale, 0).await.unwrap());

        let stored = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!((stored.upvotes, stored.downvotes, stored.version), (1, 0, 1));
    }

    #[tokio::test]
    async fn deleting_twice_is_a_no_op() {
        let store = MemoryStore::new();
        let a = account("bob", Some("b@example.com"));
        let id = a.id;
        store.insert_account(a).await.unwrap();
        assert!(store.delete_account(id).await.unwrap());
        assert!(!store.delete_account(id).await.unwrap());
        // handle and contact are free again
        store.insert_account(account("bob", Some("b@example.com"))).await.unwrap();
    }

    #[tokio::test]
    async fn score_listing_breaks_ties_by_newest() {
        let store = MemoryStore::new();
        let author = Uuid::now_v7();
        let now = Utc::now();
        let mut older = Post::new(author, "Older".into(), "Older body".into(), Category::Tech, now);
        older.created_at = now - chrono::Duration::minutes(5);
        let newer = Post::new(author, "Newer".into(), "Newer body".into(), Category::Tech, now);
        let mut best = Post::new(author, "Best".into(), "Best body!".into(), Category::Tech, now);
        best.created_at = now - chrono::Duration::hours(1);
        best.upvotes = 3;
        best.recompute_score();
        for p in [older.clone(), newer.clone(), best.clone()] {
            store.insert_post(p).await.unwrap();
        }

        let ids: Vec<Uuid> = store
            .list_posts(PostSort::Score, 0, 10)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![best.id, newer.id, older.id]);

        let page_two = store.list_posts(PostSort::Oldest, 2, 2).await.unwrap();
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].id, newer.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bulk_delete_never_strands_a_concurrent_registration() {
        let store = std::sync::Arc::new(MemoryStore::new());
        for i in 0..50 {
            store
                .insert_account(account(&format!("old-{i}"), Some(&format!("old-{i}@example.com"))))
                .await
                .unwrap();
        }

        let registrations: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_account(account(&format!("new-{i}"), Some(&format!("new-{i}@example.com"))))
                        .await
                })
            })
            .collect();
        let deleted = store.delete_all_accounts().await.unwrap();
        for task in registrations {
            task.await.unwrap().unwrap();
        }

        assert!(deleted >= 50);
        // every surviving account is still reachable through its own handle and contact
        let survivors: Vec<Account> = store.accounts.iter().map(|a| a.value().clone()).collect();
        for survivor in &survivors {
            let found = store.find_by_handle(&survivor.handle).await.unwrap();
            assert_eq!(found.map(|a| a.id), Some(survivor.id));
            let contact = survivor.contact.as_deref().unwrap();
            assert_eq!(store.contacts.get(contact).map(|id| *id), Some(survivor.id));
        }
        assert_eq!(store.handles.len(), store.accounts.len());
        assert_eq!(store.contacts.len(), store.accounts.len());
    }
}
