//! JSON snapshot of an account's surroundings
//!
//! A snapshot feeds [`MockProvider`](super::mock::MockProvider) with
//! followees, stories, feed posts and followers so a full cycle can be
//! exercised without network access.
//!
//! ```json
//! {
//!   "self_id": 1,
//!   "followed": [{ "pk": 2, "username": "alice" }],
//!   "stories": { "2": [{ "id": "2_100", "pk": 100 }] },
//!   "feed": [{ "id": "post-1", "user": { "username": "alice" } }],
//!   "followers": [{ "pk": 3, "username": "bob" }],
//!   "users": { "target_handle": 99 },
//!   "login": "accept"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{Account, FeedPost, Story, UserId};
use crate::error::ConfigError;

/// How the mock answers login attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginBehaviour {
    #[default]
    Accept,
    RejectCredentials,
    Challenge,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub self_id: UserId,
    pub followed: Vec<Account>,
    pub stories: HashMap<UserId, Vec<Story>>,
    pub feed: Vec<FeedPost>,
    pub followers: Vec<Account>,
    /// Handle to user id, for `resolve_user_id`
    pub users: HashMap<String, UserId>,
    pub login: LoginBehaviour,
}

impl Snapshot {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadError)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(ConfigError::SnapshotError)
    }

    /// Look a handle up in `users`, then among followees and followers
    pub fn find_user_id(&self, username: &str) -> Option<UserId> {
        if let Some(id) = self.users.get(username) {
            return Some(*id);
        }
        self.followed
            .iter()
            .chain(self.followers.iter())
            .find(|account| account.username == username)
            .map(|account| account.pk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "self_id": 1,
        "followed": [{ "pk": 2, "username": "alice" }],
        "stories": { "2": [{ "id": "2_100", "pk": 100 }] },
        "feed": [{ "id": "post-1", "user": { "username": "alice" } }],
        "followers": [{ "pk": 3, "username": "bob" }],
        "users": { "target_handle": 99 }
    }"#;

    #[test]
    fn test_parse_sample() {
        let snapshot = Snapshot::from_json(SAMPLE).unwrap();
        assert_eq!(snapshot.self_id, 1);
        assert_eq!(snapshot.followed, vec![Account::new(2, "alice")]);
        assert_eq!(snapshot.stories[&2][0].pk, 100);
        assert_eq!(snapshot.feed[0].user.username, "alice");
        assert_eq!(snapshot.login, LoginBehaviour::Accept);
    }

    #[test]
    fn test_login_behaviour_parses() {
        let snapshot = Snapshot::from_json(r#"{ "login": "reject_credentials" }"#).unwrap();
        assert_eq!(snapshot.login, LoginBehaviour::RejectCredentials);
        assert!(snapshot.followed.is_empty());
    }

    #[test]
    fn test_find_user_id_sources() {
        let snapshot = Snapshot::from_json(SAMPLE).unwrap();
        assert_eq!(snapshot.find_user_id("target_handle"), Some(99));
        assert_eq!(snapshot.find_user_id("alice"), Some(2));
        assert_eq!(snapshot.find_user_id("bob"), Some(3));
        assert_eq!(snapshot.find_user_id("nobody"), None);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = Snapshot::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::SnapshotError(_)));
    }
}
