//! Resilient execution of passes and login attempts
//!
//! Failures are classified with [`ProviderError::kind`] and handled here so a
//! pass never sees them twice:
//!
//! - transient: log and back off for a random delay
//! - expired session: log in again once
//! - challenge: block and retry, or give up, per [`ChallengePolicy`]
//! - invalid credentials: give up

use futures::future::LocalBoxFuture;
use tracing::{error, info, warn};

use super::{Engine, EngineState};
use crate::config::ChallengePolicy;
use crate::error::{FailureKind, Fatal, ProviderError};
use crate::provider::{ActionProvider, ProviderResult};
use crate::random::RandomSource;
use crate::timing::Sleeper;

impl<P, S, R> Engine<P, S, R>
where
    P: ActionProvider,
    S: Sleeper,
    R: RandomSource,
{
    /// Run `action` against the engine, absorbing every recoverable failure
    ///
    /// Returns `Ok(Some(value))` after a success (followed by the human-like
    /// action delay), `Ok(None)` after a recovered failure, and `Err` only
    /// for outcomes that must end the process.
    pub(crate) async fn guarded<T, F>(&mut self, label: &str, action: F) -> Result<Option<T>, Fatal>
    where
        F: for<'a> FnOnce(&'a mut Self) -> LocalBoxFuture<'a, ProviderResult<T>>,
    {
        match action(self).await {
            Ok(value) => {
                let delay = self.random.between(
                    self.settings.timing.action_delay.min,
                    self.settings.timing.action_delay.max,
                );
                self.sleeper.sleep(delay).await;
                Ok(Some(value))
            }
            Err(err) => {
                self.recover(label, err).await?;
                Ok(None)
            }
        }
    }

    async fn recover(&mut self, label: &str, err: ProviderError) -> Result<(), Fatal> {
        match err.kind() {
            FailureKind::Transient => {
                warn!("{} failed: {}", label, err);
                self.back_off().await;
                Ok(())
            }
            FailureKind::AuthExpired => {
                warn!("{} failed, session expired: {}", label, err);
                info!("Re-authenticating...");
                self.attempt_login().await.map(|_| ())
            }
            FailureKind::ChallengeRequired => {
                error!(
                    "{} interrupted: manual verification required. Please complete the challenge in the app.",
                    label
                );
                match self.settings.challenge_policy {
                    ChallengePolicy::Exit => Err(Fatal::ChallengeRequired(err.to_string())),
                    ChallengePolicy::Block => {
                        self.sleeper.sleep(self.settings.timing.challenge_wait).await;
                        self.attempt_login().await.map(|_| ())
                    }
                }
            }
            FailureKind::InvalidCredentials => {
                error!("{} failed: {}", label, err);
                Err(Fatal::InvalidCredentials(err.to_string()))
            }
        }
    }

    /// One login attempt; `Ok(false)` means "not yet, try again later"
    pub(crate) async fn attempt_login(&mut self) -> Result<bool, Fatal> {
        self.state = EngineState::Authenticating;
        info!(
            "Logging in to {} as {}",
            self.provider.name(),
            self.credentials.username()
        );

        match self.provider.authenticate(&self.credentials).await {
            Ok(self_id) => {
                info!("Logged in as {} (user id {})", self.credentials.username(), self_id);
                self.self_id = Some(self_id);
                self.state = EngineState::Running;
                Ok(true)
            }
            Err(err) => match err.kind() {
                FailureKind::InvalidCredentials => {
                    error!("Login rejected: {}", err);
                    Err(Fatal::InvalidCredentials(err.to_string()))
                }
                FailureKind::ChallengeRequired => {
                    error!("Manual verification required. Please complete the challenge in the app.");
                    match self.settings.challenge_policy {
                        ChallengePolicy::Exit => Err(Fatal::ChallengeRequired(err.to_string())),
                        ChallengePolicy::Block => {
                            let wait = self.settings.timing.challenge_wait;
                            info!(
                                "Waiting {} before retrying login",
                                humantime::format_duration(wait)
                            );
                            self.sleeper.sleep(wait).await;
                            Ok(false)
                        }
                    }
                }
                FailureKind::Transient | FailureKind::AuthExpired => {
                    warn!("Login failed: {}", err);
                    self.back_off().await;
                    Ok(false)
                }
            },
        }
    }

    async fn back_off(&mut self) {
        let delay = self.random.between(
            self.settings.timing.backoff.min,
            self.settings.timing.backoff.max,
        );
        info!("Backing off for {}", humantime::format_duration(delay));
        self.sleeper.sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::super::EngineSettings;
    use super::*;
    use crate::config::Credentials;
    use crate::provider::mock::{Call, MockProvider};
    use crate::provider::snapshot::{LoginBehaviour, Snapshot};
    use crate::random::FixedRandom;
    use crate::store::MessagedStore;
    use crate::timing::RecordingSleeper;
    use crate::tracker::DuplicateTracker;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(
        snapshot: Snapshot,
        policy: ChallengePolicy,
    ) -> (
        TempDir,
        MockProvider,
        RecordingSleeper,
        Engine<MockProvider, RecordingSleeper, FixedRandom>,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let store = MessagedStore::load(temp_dir.path().join("messaged.txt")).unwrap();
        let provider = MockProvider::new(snapshot);
        let sleeper = RecordingSleeper::new();
        let settings = EngineSettings {
            challenge_policy: policy,
            ..Default::default()
        };
        let engine = Engine::new(
            provider.clone(),
            Credentials::new("tester", "secret"),
            settings,
            DuplicateTracker::new(store),
            sleeper.clone(),
            FixedRandom(0.0),
        );
        (temp_dir, provider, sleeper, engine)
    }

    fn fail_with<E>(_engine: &mut E, err: ProviderError) -> LocalBoxFuture<'_, ProviderResult<()>> {
        Box::pin(async move { Err::<(), _>(err) })
    }

    #[tokio::test]
    async fn test_success_sleeps_action_delay() {
        let (_dir, _provider, sleeper, mut engine) = setup(Snapshot::default(), ChallengePolicy::Block);

        let value = engine
            .guarded("probe", |_engine| Box::pin(async { Ok::<_, ProviderError>(7) }))
            .await
            .unwrap();

        assert_eq!(value, Some(7));
        assert_eq!(sleeper.calls(), vec![Duration::from_millis(1200)]);
    }

    #[tokio::test]
    async fn test_transient_failure_backs_off() {
        let (_dir, _provider, sleeper, mut engine) = setup(Snapshot::default(), ChallengePolicy::Block);

        let outcome = engine
            .guarded("probe", move |engine| {
                fail_with(engine, ProviderError::Network("reset".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(outcome, None);
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(600)]);
    }

    #[tokio::test]
    async fn test_expired_session_logs_in_once() {
        let (_dir, provider, _sleeper, mut engine) = setup(Snapshot::default(), ChallengePolicy::Block);

        let outcome = engine
            .guarded(
                "probe",
                move |engine| fail_with(engine, ProviderError::LoginRequired("expired".to_string())),
            )
            .await
            .unwrap();

        assert_eq!(outcome, None);
        assert_eq!(provider.call_count(Call::Authenticate), 1);
        assert_eq!(engine.state(), EngineState::Running);
    }

    #[tokio::test]
    async fn test_challenge_block_waits_then_logs_in() {
        let (_dir, provider, sleeper, mut engine) = setup(Snapshot::default(), ChallengePolicy::Block);

        engine
            .guarded(
                "probe",
                move |engine| fail_with(engine, ProviderError::ChallengeRequired("checkpoint".to_string())),
            )
            .await
            .unwrap();

        assert_eq!(sleeper.calls(), vec![Duration::from_secs(300)]);
        assert_eq!(provider.call_count(Call::Authenticate), 1);
    }

    #[tokio::test]
    async fn test_challenge_exit_is_fatal() {
        let (_dir, provider, sleeper, mut engine) = setup(Snapshot::default(), ChallengePolicy::Exit);

        let fatal = engine
            .guarded(
                "probe",
                move |engine| fail_with(engine, ProviderError::ChallengeRequired("checkpoint".to_string())),
            )
            .await
            .unwrap_err();

        assert!(matches!(fatal, Fatal::ChallengeRequired(_)));
        assert!(sleeper.calls().is_empty());
        assert_eq!(provider.call_count(Call::Authenticate), 0);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_fatal() {
        let (_dir, _provider, _sleeper, mut engine) = setup(Snapshot::default(), ChallengePolicy::Block);

        let fatal = engine
            .guarded(
                "probe",
                move |engine| fail_with(engine, ProviderError::BadCredentials("wrong password".to_string())),
            )
            .await
            .unwrap_err();

        assert!(matches!(fatal, Fatal::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn test_login_challenge_blocks_without_failing() {
        let snapshot = Snapshot {
            login: LoginBehaviour::Challenge,
            ..Default::default()
        };
        let (_dir, _provider, sleeper, mut engine) = setup(snapshot, ChallengePolicy::Block);

        assert!(!engine.attempt_login().await.unwrap());
        assert_eq!(engine.state(), EngineState::Authenticating);
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(300)]);
    }

    #[tokio::test]
    async fn test_login_transient_failure_then_success() {
        let (_dir, provider, sleeper, mut engine) = setup(Snapshot::default(), ChallengePolicy::Block);
        provider.fail_next(Call::Authenticate, ProviderError::Network("timeout".to_string()));

        engine.authenticate().await.unwrap();

        assert_eq!(provider.call_count(Call::Authenticate), 2);
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(600)]);
        assert_eq!(engine.state(), EngineState::Running);
    }
}
