//! Mock provider implementation for testing and dry runs
//!
//! `MockProvider` serves data from a [`Snapshot`], records every call it
//! receives, and can be told to fail specific calls. Clones share state, so a
//! test can keep a handle after moving the provider into an engine.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::snapshot::{LoginBehaviour, Snapshot};
use super::{Account, ActionProvider, FeedPost, ProviderResult, Story, UserId};
use crate::config::Credentials;
use crate::error::ProviderError;

/// Provider operations, used to script failures and inspect calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Authenticate,
    ListFollowed,
    ListStories,
    MarkStorySeen,
    LikeStory,
    ListFeed,
    LikePost,
    CommentPost,
    ResolveUserId,
    Follow,
    Unfollow,
    ListFollowers,
    SendDirectMessage,
}

/// One recorded invocation with its main argument rendered as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub call: Call,
    pub arg: String,
}

#[derive(Debug, Clone)]
struct FailureRule {
    call: Call,
    /// Only match invocations with this argument
    arg: Option<String>,
    error: ProviderError,
    /// `None` means fail forever
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct MockState {
    snapshot: Snapshot,
    authenticated: bool,
    calls: Vec<RecordedCall>,
    rules: Vec<FailureRule>,
    following: Vec<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                snapshot,
                ..Default::default()
            })),
        }
    }

    /// Fail the next invocation of `call` with `error`
    pub fn fail_next(&self, call: Call, error: ProviderError) -> &Self {
        self.push_rule(call, None, error, Some(1))
    }

    /// Fail every invocation of `call`
    pub fn fail_always(&self, call: Call, error: ProviderError) -> &Self {
        self.push_rule(call, None, error, None)
    }

    /// Fail every invocation of `call` whose argument renders as `arg`
    pub fn fail_for(&self, call: Call, arg: impl Into<String>, error: ProviderError) -> &Self {
        self.push_rule(call, Some(arg.into()), error, None)
    }

    /// Drop the session so the next call reports `LoginRequired`
    pub fn expire_session(&self) {
        self.state.lock().unwrap().authenticated = false;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Arguments of every invocation of `call`, in order
    pub fn args_for(&self, call: Call) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|recorded| recorded.call == call)
            .map(|recorded| recorded.arg.clone())
            .collect()
    }

    pub fn call_count(&self, call: Call) -> usize {
        self.args_for(call).len()
    }

    /// User ids currently followed through this provider
    pub fn following(&self) -> Vec<UserId> {
        self.state.lock().unwrap().following.clone()
    }

    fn push_rule(
        &self,
        call: Call,
        arg: Option<String>,
        error: ProviderError,
        remaining: Option<usize>,
    ) -> &Self {
        self.state.lock().unwrap().rules.push(FailureRule {
            call,
            arg,
            error,
            remaining,
        });
        self
    }

    /// Record the invocation, apply failure rules and the session check
    fn enter(&self, call: Call, arg: String) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            call,
            arg: arg.clone(),
        });

        let matched = state.rules.iter_mut().position(|rule| {
            rule.call == call
                && rule.remaining != Some(0)
                && rule.arg.as_ref().map_or(true, |expected| *expected == arg)
        });
        if let Some(index) = matched {
            let rule = &mut state.rules[index];
            if let Some(remaining) = rule.remaining.as_mut() {
                *remaining -= 1;
            }
            return Err(rule.error.clone());
        }

        if call != Call::Authenticate && !state.authenticated {
            return Err(ProviderError::LoginRequired("Not authenticated".to_string()));
        }
        Ok(())
    }

    fn with_snapshot<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        f(&self.state.lock().unwrap().snapshot)
    }
}

#[async_trait]
impl ActionProvider for MockProvider {
    async fn authenticate(&mut self, credentials: &Credentials) -> ProviderResult<UserId> {
        self.enter(Call::Authenticate, credentials.username().to_string())?;

        let mut state = self.state.lock().unwrap();
        match state.snapshot.login {
            LoginBehaviour::Accept => {
                state.authenticated = true;
                Ok(state.snapshot.self_id)
            }
            LoginBehaviour::RejectCredentials => Err(ProviderError::BadCredentials(format!(
                "login rejected for {}",
                credentials.username()
            ))),
            LoginBehaviour::Challenge => Err(ProviderError::ChallengeRequired(
                "verification required".to_string(),
            )),
        }
    }

    async fn list_followed(&self, self_id: UserId) -> ProviderResult<Vec<Account>> {
        self.enter(Call::ListFollowed, self_id.to_string())?;
        Ok(self.with_snapshot(|s| s.followed.clone()))
    }

    async fn list_stories(&self, user_pk: UserId) -> ProviderResult<Vec<Story>> {
        self.enter(Call::ListStories, user_pk.to_string())?;
        Ok(self.with_snapshot(|s| s.stories.get(&user_pk).cloned().unwrap_or_default()))
    }

    async fn mark_story_seen(&self, story_pk: u64) -> ProviderResult<()> {
        self.enter(Call::MarkStorySeen, story_pk.to_string())
    }

    async fn like_story(&self, story_id: &str) -> ProviderResult<()> {
        self.enter(Call::LikeStory, story_id.to_string())
    }

    async fn list_feed(&self, self_id: UserId, limit: usize) -> ProviderResult<Vec<FeedPost>> {
        self.enter(Call::ListFeed, self_id.to_string())?;
        Ok(self.with_snapshot(|s| s.feed.iter().take(limit).cloned().collect()))
    }

    async fn like_post(&self, post_id: &str) -> ProviderResult<()> {
        self.enter(Call::LikePost, post_id.to_string())
    }

    async fn comment_post(&self, post_id: &str, text: &str) -> ProviderResult<()> {
        self.enter(Call::CommentPost, post_id.to_string())?;
        info!("[{}] comment on {}: {}", self.name(), post_id, text);
        Ok(())
    }

    async fn resolve_user_id(&self, username: &str) -> ProviderResult<UserId> {
        self.enter(Call::ResolveUserId, username.to_string())?;
        self.with_snapshot(|s| s.find_user_id(username))
            .ok_or_else(|| ProviderError::Client(format!("user not found: {}", username)))
    }

    async fn follow(&self, user_id: UserId) -> ProviderResult<()> {
        self.enter(Call::Follow, user_id.to_string())?;
        let mut state = self.state.lock().unwrap();
        if !state.following.contains(&user_id) {
            state.following.push(user_id);
        }
        Ok(())
    }

    async fn unfollow(&self, user_id: UserId) -> ProviderResult<()> {
        self.enter(Call::Unfollow, user_id.to_string())?;
        self.state
            .lock()
            .unwrap()
            .following
            .retain(|followed| *followed != user_id);
        Ok(())
    }

    async fn list_followers(&self, self_id: UserId) -> ProviderResult<Vec<Account>> {
        self.enter(Call::ListFollowers, self_id.to_string())?;
        Ok(self.with_snapshot(|s| s.followers.clone()))
    }

    async fn send_direct_message(&self, text: &str, user_ids: &[UserId]) -> ProviderResult<()> {
        let recipients = user_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.enter(Call::SendDirectMessage, recipients.clone())?;
        info!("[{}] message to {}: {}", self.name(), recipients, text);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("tester", "secret")
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            self_id: 1,
            followed: vec![Account::new(2, "alice")],
            stories: [(2, vec![Story { id: "2_10".to_string(), pk: 10 }])]
                .into_iter()
                .collect(),
            feed: vec![FeedPost::new("p1", "alice"), FeedPost::new("p2", "alice")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mock_success() {
        let mut provider = MockProvider::new(snapshot());

        let self_id = provider.authenticate(&credentials()).await.unwrap();
        assert_eq!(self_id, 1);

        let followed = provider.list_followed(self_id).await.unwrap();
        assert_eq!(followed.len(), 1);

        let stories = provider.list_stories(2).await.unwrap();
        assert_eq!(stories[0].id, "2_10");

        assert_eq!(provider.call_count(Call::Authenticate), 1);
        assert_eq!(provider.args_for(Call::ListStories), vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_requires_authentication() {
        let provider = MockProvider::new(snapshot());

        let result = provider.list_followed(1).await;
        assert!(matches!(result, Err(ProviderError::LoginRequired(_))));
    }

    #[tokio::test]
    async fn test_mock_expire_session() {
        let mut provider = MockProvider::new(snapshot());
        provider.authenticate(&credentials()).await.unwrap();
        provider.expire_session();

        let result = provider.like_post("p1").await;
        assert!(matches!(result, Err(ProviderError::LoginRequired(_))));
    }

    #[tokio::test]
    async fn test_mock_fail_next_is_one_shot() {
        let mut provider = MockProvider::new(snapshot());
        provider.authenticate(&credentials()).await.unwrap();
        provider.fail_next(Call::LikePost, ProviderError::Network("reset".to_string()));

        assert!(provider.like_post("p1").await.is_err());
        assert!(provider.like_post("p1").await.is_ok());
        assert_eq!(provider.call_count(Call::LikePost), 2);
    }

    #[tokio::test]
    async fn test_mock_fail_for_matches_argument() {
        let mut provider = MockProvider::new(snapshot());
        provider.authenticate(&credentials()).await.unwrap();
        provider.fail_for(
            Call::ListStories,
            "2",
            ProviderError::Client("private".to_string()),
        );

        assert!(provider.list_stories(2).await.is_err());
        assert!(provider.list_stories(2).await.is_err());
        assert!(provider.list_stories(3).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_feed_respects_limit() {
        let mut provider = MockProvider::new(snapshot());
        provider.authenticate(&credentials()).await.unwrap();

        let feed = provider.list_feed(1, 1).await.unwrap();
        assert_eq!(feed.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_login_behaviours() {
        let mut rejecting = MockProvider::new(Snapshot {
            login: LoginBehaviour::RejectCredentials,
            ..Default::default()
        });
        assert!(matches!(
            rejecting.authenticate(&credentials()).await,
            Err(ProviderError::BadCredentials(_))
        ));

        let mut challenging = MockProvider::new(Snapshot {
            login: LoginBehaviour::Challenge,
            ..Default::default()
        });
        assert!(matches!(
            challenging.authenticate(&credentials()).await,
            Err(ProviderError::ChallengeRequired(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_follow_unfollow_tracks_state() {
        let mut provider = MockProvider::new(snapshot());
        provider.authenticate(&credentials()).await.unwrap();

        provider.follow(99).await.unwrap();
        assert_eq!(provider.following(), vec![99]);
        provider.unfollow(99).await.unwrap();
        assert!(provider.following().is_empty());
    }
}
