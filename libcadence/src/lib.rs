//! Cadence - a scheduled, rate-limited engagement runner
//!
//! This library drives periodic engagement cycles against a social platform
//! (story views, feed likes and comments, a follow/unfollow of one target
//! account, welcome messages to new followers) while staying under daily
//! quotas, pacing every action and surviving provider failures.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod provider;
pub mod quota;
pub mod random;
pub mod store;
pub mod timing;
pub mod tracker;

// Re-export commonly used types
pub use config::{ChallengePolicy, Config, Credentials};
pub use engine::{CycleReport, Engine, EngineSettings, EngineState};
pub use error::{CadenceError, Fatal, ProviderError, Result};
pub use provider::ActionProvider;
pub use quota::{Category, Quota};
pub use store::MessagedStore;
pub use tracker::DuplicateTracker;
