//! Cycle orchestration
//!
//! [`Engine`] owns the provider, the duplicate tracker and the injected
//! sleeper and random source. It logs in (the *authenticating* state), then
//! runs the fixed pass sequence once per cycle (the *running* state) until a
//! [`Fatal`] outcome stops it:
//!
//! 1. stories of followed accounts
//! 2. feed likes and comments
//! 3. follow/unfollow of the target account, when one is configured
//! 4. welcome messages to new followers, when enabled
//!
//! Every pass goes through the resilient wrapper in [`guard`], so provider
//! failures never escape a cycle.

mod guard;
mod passes;

use std::time::Duration;

use tracing::info;

use crate::config::{ChallengePolicy, Config, Credentials, EngagementConfig};
use crate::error::{Fatal, ProviderError, Result};
use crate::provider::{ActionProvider, ProviderResult, UserId};
use crate::quota::Quota;
use crate::random::{RandomSource, SystemRandom};
use crate::store::MessagedStore;
use crate::timing::{Sleeper, Timing, TokioSleeper};
use crate::tracker::DuplicateTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Authenticating,
    Running,
}

/// Everything the engine needs besides credentials and collaborators
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub quota: Quota,
    pub timing: Timing,
    pub engagement: EngagementConfig,
    pub challenge_policy: ChallengePolicy,
    pub target_account: Option<String>,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quota: config.quota.clone(),
            timing: config.timing.clone(),
            engagement: config.engagement.clone(),
            challenge_policy: config.challenge_policy,
            target_account: config.target_account.clone(),
        }
    }
}

/// Successful actions in one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub stories_viewed: u32,
    pub stories_liked: u32,
    pub posts_liked: u32,
    pub posts_commented: u32,
    pub follows: u32,
    pub unfollows: u32,
    pub messages_sent: u32,
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "stories viewed={} liked={}, posts liked={} commented={}, follows={} unfollows={}, messages={}",
            self.stories_viewed,
            self.stories_liked,
            self.posts_liked,
            self.posts_commented,
            self.follows,
            self.unfollows,
            self.messages_sent
        )
    }
}

pub struct Engine<P, S = TokioSleeper, R = SystemRandom> {
    provider: P,
    credentials: Credentials,
    settings: EngineSettings,
    tracker: DuplicateTracker,
    sleeper: S,
    random: R,
    state: EngineState,
    self_id: Option<UserId>,
    target_id: Option<UserId>,
    report: CycleReport,
    cycles: u64,
}

impl<P: ActionProvider> Engine<P, TokioSleeper, SystemRandom> {
    /// Build a production engine: real timers, entropy-seeded randomness and
    /// the messaged-user store named in `config`
    pub fn from_config(config: Config, provider: P) -> Result<Self> {
        let settings = EngineSettings::from_config(&config);
        let store = MessagedStore::load(&config.messaged_store)?;
        info!(
            "Loaded {} previously messaged user(s) from {}",
            store.len(),
            store.path().display()
        );
        let tracker = DuplicateTracker::new(store).with_max_entries(config.tracker.max_entries);

        Ok(Self::new(
            provider,
            config.credentials,
            settings,
            tracker,
            TokioSleeper,
            SystemRandom::new(),
        ))
    }
}

impl<P, S, R> Engine<P, S, R>
where
    P: ActionProvider,
    S: Sleeper,
    R: RandomSource,
{
    pub fn new(
        provider: P,
        credentials: Credentials,
        settings: EngineSettings,
        tracker: DuplicateTracker,
        sleeper: S,
        random: R,
    ) -> Self {
        Self {
            provider,
            credentials,
            settings,
            tracker,
            sleeper,
            random,
            state: EngineState::Authenticating,
            self_id: None,
            target_id: None,
            report: CycleReport::default(),
            cycles: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn self_id(&self) -> Option<UserId> {
        self.self_id
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &DuplicateTracker {
        &self.tracker
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Report of the current or most recent cycle
    pub fn last_report(&self) -> &CycleReport {
        &self.report
    }

    /// Log in, retrying until the session is established
    ///
    /// Transient failures back off and retry; a challenge blocks and retries
    /// or is fatal depending on [`ChallengePolicy`]; invalid credentials are
    /// always fatal.
    pub async fn authenticate(&mut self) -> std::result::Result<(), Fatal> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self.attempt_login().await? {
                return Ok(());
            }
            info!("Authentication attempt {} did not succeed, trying again", attempts);
        }
    }

    /// Run one full cycle of passes
    pub async fn run_cycle(&mut self) -> std::result::Result<CycleReport, Fatal> {
        if self.state == EngineState::Authenticating {
            self.authenticate().await?;
        }

        self.cycles += 1;
        self.report = CycleReport {
            cycle: self.cycles,
            ..Default::default()
        };
        info!(
            "--- Starting engagement cycle {} at {} ---",
            self.cycles,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        self.guarded("stories", |engine| Box::pin(engine.story_pass()))
            .await?;
        self.guarded("feed", |engine| Box::pin(engine.feed_pass()))
            .await?;
        if self.settings.target_account.is_some() {
            self.guarded("target", |engine| Box::pin(engine.target_pass()))
                .await?;
        }
        if self.settings.engagement.dm_new_followers {
            self.guarded("welcome messages", |engine| Box::pin(engine.dm_pass()))
                .await?;
        }

        info!("--- Cycle {} completed: {} ---", self.cycles, self.report);
        Ok(self.report.clone())
    }

    /// Authenticate, then run cycles separated by the cycle interval
    ///
    /// With `max_cycles` of `None` this only returns on a fatal outcome.
    /// With `Some(n)` it returns after the n-th cycle without the trailing
    /// sleep.
    pub async fn run(&mut self, max_cycles: Option<u64>) -> std::result::Result<(), Fatal> {
        self.authenticate().await?;
        if max_cycles == Some(0) {
            return Ok(());
        }

        let mut completed = 0u64;
        loop {
            self.run_cycle().await?;
            completed += 1;
            if max_cycles.is_some_and(|max| completed >= max) {
                return Ok(());
            }

            let interval = self.settings.timing.cycle_interval;
            info!("Next cycle at {}", next_cycle_at(interval));
            self.sleeper.sleep(interval).await;
        }
    }

    fn require_self_id(&self) -> ProviderResult<UserId> {
        self.self_id
            .ok_or_else(|| ProviderError::LoginRequired("no active session".to_string()))
    }
}

fn next_cycle_at(interval: Duration) -> String {
    let delta = chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());
    (chrono::Local::now() + delta).format("%H:%M:%S").to_string()
}
