//! Configuration management for Cadence
//!
//! Credentials and the handful of deployment knobs come from environment
//! variables. Tuning (quotas, timing, engagement wording, tracker cap) can be
//! supplied in an optional TOML file named by `CADENCE_CONFIG`:
//!
//! ```toml
//! [quotas]
//! likes = 50
//! dms = 10
//!
//! [timing]
//! cycle_interval = "45m"
//! backoff = { min = "10m", max = "20m" }
//!
//! [engagement]
//! comment_probability = 0.2
//! comments = ["Nice!", "Love this"]
//!
//! [tracker]
//! max_entries = 50000
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ConfigError, Result};
use crate::quota::{Category, Quota};
use crate::timing::Timing;

pub const ENV_USERNAME: &str = "CADENCE_USERNAME";
pub const ENV_PASSWORD: &str = "CADENCE_PASSWORD";
pub const ENV_TARGET_ACCOUNT: &str = "CADENCE_TARGET_ACCOUNT";
pub const ENV_MESSAGED_STORE: &str = "CADENCE_MESSAGED_STORE";
pub const ENV_CHALLENGE_POLICY: &str = "CADENCE_CHALLENGE_POLICY";
pub const ENV_CONFIG: &str = "CADENCE_CONFIG";

/// Account login; the password never shows up in `Debug` output
#[derive(Debug)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

/// What to do when the platform demands manual verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChallengePolicy {
    /// Tell the operator, wait, then log in again
    #[default]
    Block,
    /// Tell the operator and stop the process
    Exit,
}

impl FromStr for ChallengePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(ChallengePolicy::Block),
            "exit" => Ok(ChallengePolicy::Exit),
            _ => Err(format!(
                "Invalid challenge policy: '{}'. Valid options: block, exit",
                s
            )),
        }
    }
}

impl std::fmt::Display for ChallengePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengePolicy::Block => write!(f, "block"),
            ChallengePolicy::Exit => write!(f, "exit"),
        }
    }
}

/// Probabilities and canned text used by the passes
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub story_like_probability: f64,
    pub comment_probability: f64,
    pub comments: Vec<String>,
    /// `{username}` is replaced with the follower's handle
    pub welcome_template: String,
    pub dm_new_followers: bool,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            story_like_probability: 0.7,
            comment_probability: 0.3,
            comments: vec![
                "Great content!".to_string(),
                "Well done!".to_string(),
                "Awesome post!".to_string(),
            ],
            welcome_template: "Hi {username}, thanks for connecting!".to_string(),
            dm_new_followers: true,
        }
    }
}

impl EngagementConfig {
    pub fn welcome_message(&self, username: &str) -> String {
        self.welcome_template.replace("{username}", username)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (field, value) in [
            ("engagement.story_like_probability", self.story_like_probability),
            ("engagement.comment_probability", self.comment_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("{} is not between 0 and 1", value),
                });
            }
        }
        if self.comments.is_empty() && self.comment_probability > 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "engagement.comments".to_string(),
                reason: "at least one comment is required when commenting is enabled".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Per-category cap for in-memory duplicate sets; unbounded when absent
    pub max_entries: Option<usize>,
}

impl TrackerConfig {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_entries == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "tracker.max_entries".to_string(),
                reason: "must be at least 1; omit it for no cap".to_string(),
            });
        }
        Ok(())
    }
}

/// Optional TOML tuning file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Category name to ceiling, e.g. `likes = 50`
    pub quotas: HashMap<String, u32>,
    pub timing: Timing,
    pub engagement: EngagementConfig,
    pub tracker: TrackerConfig,
    pub target_account: Option<String>,
    pub messaged_store: Option<String>,
    pub challenge_policy: Option<String>,
}

impl FileConfig {
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: FileConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

#[derive(Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub target_account: Option<String>,
    pub messaged_store: PathBuf,
    pub challenge_policy: ChallengePolicy,
    pub quota: Quota,
    pub timing: Timing,
    pub engagement: EngagementConfig,
    pub tracker: TrackerConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Environment values win over the TOML file for the target account,
    /// store path and challenge policy. Credentials are never read from the
    /// file.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let username =
            non_empty(ENV_USERNAME).ok_or_else(|| ConfigError::MissingField(ENV_USERNAME.to_string()))?;
        let password =
            non_empty(ENV_PASSWORD).ok_or_else(|| ConfigError::MissingField(ENV_PASSWORD.to_string()))?;

        let file = match non_empty(ENV_CONFIG) {
            Some(path) => FileConfig::load_from_path(&expand_path(&path))?,
            None => FileConfig::default(),
        };

        let target_account = non_empty(ENV_TARGET_ACCOUNT)
            .or(file.target_account)
            .map(|handle| handle.trim().trim_start_matches('@').to_string());

        let messaged_store = match non_empty(ENV_MESSAGED_STORE).or(file.messaged_store) {
            Some(path) => expand_path(&path),
            None => default_messaged_store_path()?,
        };

        let challenge_policy = match non_empty(ENV_CHALLENGE_POLICY).or(file.challenge_policy) {
            Some(raw) => raw.parse::<ChallengePolicy>().map_err(|reason| ConfigError::InvalidValue {
                field: ENV_CHALLENGE_POLICY.to_string(),
                reason,
            })?,
            None => ChallengePolicy::default(),
        };

        let mut quota = Quota::default();
        for (name, limit) in file.quotas {
            let category = name
                .parse::<Category>()
                .map_err(|reason| ConfigError::InvalidValue {
                    field: format!("quotas.{}", name),
                    reason,
                })?;
            quota = quota.with_limit(category, limit);
        }

        file.timing.validate()?;
        file.engagement.validate()?;
        file.tracker.validate()?;

        Ok(Self {
            credentials: Credentials::new(username.trim(), password),
            target_account,
            messaged_store,
            challenge_policy,
            quota,
            timing: file.timing,
            engagement: file.engagement,
            tracker: file.tracker,
        })
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("cadence"))
}

fn default_messaged_store_path() -> Result<PathBuf> {
    Ok(resolve_data_path()?.join("messaged_users.txt"))
}
