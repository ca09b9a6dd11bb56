//! Action provider abstraction
//!
//! The engine never talks to a social platform directly. Everything remote
//! goes through [`ActionProvider`], a small capability trait that a
//! platform client implements. Errors are reported as [`ProviderError`] so
//! the resilient wrapper can classify them.
//!
//! # Examples
//!
//! ```no_run
//! use libcadence::config::Credentials;
//! use libcadence::provider::{mock::MockProvider, snapshot::Snapshot, ActionProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let snapshot = Snapshot::from_path("account.json")?;
//! let mut provider = MockProvider::new(snapshot);
//!
//! let credentials = Credentials::new("someone", "hunter2");
//! let self_id = provider.authenticate(&credentials).await?;
//!
//! for account in provider.list_followed(self_id).await? {
//!     println!("{} has {} stories", account.username, provider.list_stories(account.pk).await?.len());
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Credentials;
use crate::error::ProviderError;

// Mock provider is available for all builds (not just tests) so the daemon can
// dry-run against a snapshot and integration tests can spy on calls.
pub mod mock;
pub mod snapshot;

pub type UserId = u64;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// An account as returned by followee/follower listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub pk: UserId,
    pub username: String,
}

impl Account {
    pub fn new(pk: UserId, username: impl Into<String>) -> Self {
        Self {
            pk,
            username: username.into(),
        }
    }
}

/// A story item; `id` is used for likes and de-duplication, `pk` for marking seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub pk: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthor {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: String,
    pub user: PostAuthor,
}

impl FeedPost {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user: PostAuthor {
                username: username.into(),
            },
        }
    }
}

/// Remote capabilities the engine needs from a platform client
#[async_trait]
pub trait ActionProvider: Send + Sync {
    /// Log in and return the authenticated account's own user id
    ///
    /// # Errors
    ///
    /// - `ProviderError::ChallengeRequired` when the platform wants manual verification
    /// - `ProviderError::BadCredentials` for a wrong password or suspicious login
    /// - any transient variant for network trouble
    async fn authenticate(&mut self, credentials: &Credentials) -> ProviderResult<UserId>;

    async fn list_followed(&self, self_id: UserId) -> ProviderResult<Vec<Account>>;

    async fn list_stories(&self, user_pk: UserId) -> ProviderResult<Vec<Story>>;

    async fn mark_story_seen(&self, story_pk: u64) -> ProviderResult<()>;

    async fn like_story(&self, story_id: &str) -> ProviderResult<()>;

    /// Fetch at most `limit` feed posts
    async fn list_feed(&self, self_id: UserId, limit: usize) -> ProviderResult<Vec<FeedPost>>;

    async fn like_post(&self, post_id: &str) -> ProviderResult<()>;

    async fn comment_post(&self, post_id: &str, text: &str) -> ProviderResult<()>;

    async fn resolve_user_id(&self, username: &str) -> ProviderResult<UserId>;

    async fn follow(&self, user_id: UserId) -> ProviderResult<()>;

    async fn unfollow(&self, user_id: UserId) -> ProviderResult<()>;

    async fn list_followers(&self, self_id: UserId) -> ProviderResult<Vec<Account>>;

    async fn send_direct_message(&self, text: &str, user_ids: &[UserId]) -> ProviderResult<()>;

    /// Short identifier used in log lines
    fn name(&self) -> &str;
}
