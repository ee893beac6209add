//! # tb-services
//!
//! Use cases over the `tb-core` ports. Every service holds its collaborators
//! as trait objects so the binary can assemble any storage/auth combination.

pub mod accounts;
pub mod identity;
pub mod milestones;
pub mod posts;
pub mod retry;
pub mod votes;

use std::sync::Arc;

use tb_core::traits::{AccountRepo, CredentialHasher, PostRepo, TokenService};

pub use accounts::{AccountService, DeletionReport, NewAccount, PublicProfile, Session};
pub use identity::Authenticator;
pub use milestones::{MilestoneDispatcher, MilestoneListing, MilestoneRow, TriggeredAction};
pub use posts::{ListQuery, NewPost, Pagination, PostPage, PostService, PostView};
pub use votes::{VoteEngine, VoteResult};

/// Every service, wired to the same stores.
pub struct Services {
    pub auth: Authenticator,
    pub accounts: AccountService,
    pub posts: PostService,
    pub votes: VoteEngine,
    pub dispatcher: MilestoneDispatcher,
    pub milestones: MilestoneListing,
}

impl Services {
    pub fn new(
        account_repo: Arc<dyn AccountRepo>,
        post_repo: Arc<dyn PostRepo>,
        tokens: Arc<dyn TokenService>,
        hasher: Arc<dyn CredentialHasher>,
        admin_handles: Vec<String>,
    ) -> Self {
        Self {
            auth: Authenticator::new(tokens.clone(), account_repo.clone()),
            accounts: AccountService::new(
                account_repo.clone(),
                post_repo.clone(),
                tokens,
                hasher,
                admin_handles,
            ),
            posts: PostService::new(post_repo.clone(), account_repo.clone()),
            votes: VoteEngine::new(post_repo.clone(), account_repo.clone()),
            dispatcher: MilestoneDispatcher::new(post_repo.clone()),
            milestones: MilestoneListing::new(post_repo, account_repo),
        }
    }
}
