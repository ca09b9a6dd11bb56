//! The per-cycle passes
//!
//! Each pass keeps its own quota counter. Failures on a single item are
//! logged and skipped when transient; anything else ends the pass and is
//! handed to the wrapper.

use tracing::{debug, error, info, warn};

use super::Engine;
use crate::provider::{Account, ActionProvider, FeedPost, ProviderResult, UserId};
use crate::quota::Category;
use crate::random::RandomSource;
use crate::timing::Sleeper;

impl<P, S, R> Engine<P, S, R>
where
    P: ActionProvider,
    S: Sleeper,
    R: RandomSource,
{
    /// View (and maybe like) unseen stories of followed accounts
    pub(crate) async fn story_pass(&mut self) -> ProviderResult<()> {
        let self_id = self.require_self_id()?;
        let followed = self.provider.list_followed(self_id).await?;
        debug!("Checking stories of {} followed account(s)", followed.len());

        let mut viewed = 0u32;
        for account in followed {
            if !self.settings.quota.within_limit(Category::StoryViews, viewed) {
                info!("Story view limit reached ({})", viewed);
                break;
            }

            match self.view_stories_of(&account, &mut viewed).await {
                Ok(()) => {}
                Err(err) if err.is_transient() => {
                    warn!("Error processing stories for {}: {}", account.username, err);
                    self.sleeper
                        .sleep(self.settings.timing.item_failure_pause)
                        .await;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn view_stories_of(&mut self, account: &Account, viewed: &mut u32) -> ProviderResult<()> {
        let stories = self.provider.list_stories(account.pk).await?;

        for story in stories {
            if !self.settings.quota.within_limit(Category::StoryViews, *viewed) {
                break;
            }
            if self.tracker.has_acted(Category::StoryViews, &story.id) {
                debug!("Story {} already viewed, skipping", story.id);
                continue;
            }

            self.provider.mark_story_seen(story.pk).await?;
            self.remember(Category::StoryViews, &story.id);
            *viewed += 1;
            self.report.stories_viewed += 1;

            if self
                .random
                .chance(self.settings.engagement.story_like_probability)
            {
                self.provider.like_story(&story.id).await?;
                self.report.stories_liked += 1;
            }
            info!("Processed story {} by {}", story.id, account.username);
        }
        Ok(())
    }

    /// Like, and sometimes comment on, feed posts not touched before
    pub(crate) async fn feed_pass(&mut self) -> ProviderResult<()> {
        let self_id = self.require_self_id()?;
        let limit = self.settings.quota.limit(Category::Likes) as usize;
        let feed = self.provider.list_feed(self_id, limit).await?;
        debug!("Fetched {} feed post(s)", feed.len());

        let mut liked = 0u32;
        let mut commented = 0u32;
        for post in feed {
            if self.tracker.has_acted(Category::Likes, &post.id) {
                debug!("Post {} already liked, skipping", post.id);
                continue;
            }

            if let Err(err) = self.engage_post(&post, &mut liked, &mut commented).await {
                if !err.is_transient() {
                    return Err(err);
                }
                warn!(
                    "Error engaging with post {} by {}: {}",
                    post.id, post.user.username, err
                );
            }
        }
        Ok(())
    }

    async fn engage_post(
        &mut self,
        post: &FeedPost,
        liked: &mut u32,
        commented: &mut u32,
    ) -> ProviderResult<()> {
        if self.settings.quota.within_limit(Category::Likes, *liked) {
            self.provider.like_post(&post.id).await?;
            self.remember(Category::Likes, &post.id);
            *liked += 1;
            self.report.posts_liked += 1;
            info!("Liked post {} by {}", post.id, post.user.username);
        }

        let wants_comment = self.settings.quota.within_limit(Category::Comments, *commented)
            && !self.tracker.has_acted(Category::Comments, &post.id)
            && self
                .random
                .chance(self.settings.engagement.comment_probability);
        if !wants_comment {
            return Ok(());
        }

        let comments = &self.settings.engagement.comments;
        let Some(index) = self.random.pick(comments.len()) else {
            debug!("No comment texts configured, not commenting on {}", post.id);
            return Ok(());
        };
        let text = comments[index].clone();

        self.provider.comment_post(&post.id, &text).await?;
        self.remember(Category::Comments, &post.id);
        *commented += 1;
        self.report.posts_commented += 1;
        info!("Commented on post {} by {}: {}", post.id, post.user.username, text);
        Ok(())
    }

    /// Follow the target account, hold, then unfollow it
    ///
    /// A follow left over from an earlier cycle (its unfollow failed) is
    /// undone instead of following again.
    pub(crate) async fn target_pass(&mut self) -> ProviderResult<()> {
        let Some(target) = self.settings.target_account.clone() else {
            return Ok(());
        };

        if self.tracker.has_acted(Category::Follows, &target) {
            info!("{} is still followed from an earlier cycle, unfollowing", target);
            self.unfollow_target().await?;
            return Ok(());
        }

        if !self
            .settings
            .quota
            .within_limit(Category::Follows, self.report.follows)
        {
            info!("Follow limit reached, not following {}", target);
            return Ok(());
        }

        if !self.follow_target().await? {
            return Ok(());
        }

        let hold = self.random.between(
            self.settings.timing.follow_hold.min,
            self.settings.timing.follow_hold.max,
        );
        info!(
            "Keeping {} followed for {}",
            target,
            humantime::format_duration(hold)
        );
        self.sleeper.sleep(hold).await;

        self.unfollow_target().await?;
        Ok(())
    }

    /// Follow the configured target account
    ///
    /// Returns `Ok(false)` without touching the provider when no target is
    /// configured or the target is already followed.
    pub async fn follow_target(&mut self) -> ProviderResult<bool> {
        let Some(target) = self.settings.target_account.clone() else {
            return Ok(false);
        };
        if self.tracker.has_acted(Category::Follows, &target) {
            debug!("{} already followed", target);
            return Ok(false);
        }

        let user_id = self.target_user_id(&target).await?;
        self.provider.follow(user_id).await?;
        self.remember(Category::Follows, &target);
        self.report.follows += 1;
        info!("Followed {}", target);
        Ok(true)
    }

    /// Unfollow the configured target account
    ///
    /// Returns `Ok(false)` without touching the provider unless the target
    /// is currently recorded as followed.
    pub async fn unfollow_target(&mut self) -> ProviderResult<bool> {
        let Some(target) = self.settings.target_account.clone() else {
            return Ok(false);
        };
        if !self.tracker.has_acted(Category::Follows, &target) {
            debug!("{} is not followed, nothing to undo", target);
            return Ok(false);
        }

        let user_id = self.target_user_id(&target).await?;
        self.provider.unfollow(user_id).await?;
        if let Err(err) = self.tracker.forget(Category::Follows, &target) {
            error!("Failed to clear follow record for {}: {}", target, err);
        }
        self.report.unfollows += 1;
        info!("Unfollowed {}", target);
        Ok(true)
    }

    /// Send the welcome message to followers who never received it
    pub(crate) async fn dm_pass(&mut self) -> ProviderResult<()> {
        let self_id = self.require_self_id()?;
        let followers = self.provider.list_followers(self_id).await?;
        debug!("Checking {} follower(s) for welcome messages", followers.len());

        let mut sent = 0u32;
        for follower in followers {
            if !self.settings.quota.within_limit(Category::Dms, sent) {
                info!("Direct message limit reached ({})", sent);
                break;
            }
            if self.tracker.has_messaged(follower.pk) {
                continue;
            }

            let message = self.settings.engagement.welcome_message(&follower.username);
            match self
                .provider
                .send_direct_message(&message, &[follower.pk])
                .await
            {
                Ok(()) => {
                    if let Err(err) = self.tracker.record_messaged(follower.pk) {
                        error!("Failed to persist messaged user {}: {}", follower.pk, err);
                    }
                    sent += 1;
                    self.report.messages_sent += 1;
                    info!("Sent welcome message to {}", follower.username);
                }
                Err(err) if err.is_transient() => {
                    warn!("Failed to message {}: {}", follower.username, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn target_user_id(&mut self, target: &str) -> ProviderResult<UserId> {
        if let Some(user_id) = self.target_id {
            return Ok(user_id);
        }
        let user_id = self.provider.resolve_user_id(target).await?;
        self.target_id = Some(user_id);
        Ok(user_id)
    }

    fn remember(&mut self, category: Category, id: &str) {
        if let Err(err) = self.tracker.record(category, id) {
            error!("Failed to record {} for {}: {}", category, id, err);
        }
    }
}
