//! Waiting and pacing
//!
//! All suspension in the engine goes through [`Sleeper`]. Production uses
//! tokio's timer; tests use [`RecordingSleeper`], which returns immediately
//! and remembers what was requested.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that records durations instead of waiting
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration requested so far, in order
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }

    /// Durations that fall inside `[min, max]`
    pub fn calls_between(&self, min: Duration, max: Duration) -> Vec<Duration> {
        self.calls_within(DelayRange { min, max })
    }

    /// Durations that `range` could have produced
    pub fn calls_within(&self, range: DelayRange) -> Vec<Duration> {
        self.calls()
            .into_iter()
            .filter(|d| range.contains(*d))
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

/// Inclusive bounds for a jittered delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DelayRange {
    #[serde(deserialize_with = "deserialize_duration")]
    pub min: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub max: Duration,
}

impl DelayRange {
    pub const fn secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub fn contains(&self, duration: Duration) -> bool {
        duration >= self.min && duration <= self.max
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!(
                    "min ({}) must not exceed max ({})",
                    humantime::format_duration(self.min),
                    humantime::format_duration(self.max)
                ),
            });
        }
        Ok(())
    }
}

/// Every delay the engine uses
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause after each successful wrapped action
    pub action_delay: DelayRange,
    /// Wait after a transient failure before returning to the cycle
    pub backoff: DelayRange,
    /// Wait for the operator to clear a verification challenge
    #[serde(deserialize_with = "deserialize_duration")]
    pub challenge_wait: Duration,
    /// How long the target account stays followed
    pub follow_hold: DelayRange,
    /// Pause after one account's stories fail to load
    #[serde(deserialize_with = "deserialize_duration")]
    pub item_failure_pause: Duration,
    /// Sleep between cycles
    #[serde(deserialize_with = "deserialize_duration")]
    pub cycle_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            action_delay: DelayRange::millis(1200, 3800),
            backoff: DelayRange::secs(600, 1200),
            challenge_wait: Duration::from_secs(300),
            follow_hold: DelayRange::secs(600, 1200),
            item_failure_pause: Duration::from_secs(300),
            cycle_interval: Duration::from_secs(1800),
        }
    }
}

impl Timing {
    /// No waiting at all; useful for dry runs and tests
    pub fn immediate() -> Self {
        Self {
            action_delay: DelayRange::secs(0, 0),
            backoff: DelayRange::secs(0, 0),
            challenge_wait: Duration::ZERO,
            follow_hold: DelayRange::secs(0, 0),
            item_failure_pause: Duration::ZERO,
            cycle_interval: Duration::ZERO,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.action_delay.validate("timing.action_delay")?;
        self.backoff.validate("timing.backoff")?;
        self.follow_hold.validate("timing.follow_hold")?;
        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}
