//! Duplicate tracking per action category
//!
//! Stories, likes, comments and follows are remembered in memory for the
//! lifetime of the process. Direct messages are backed by [`MessagedStore`]
//! so they survive restarts.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::error::StoreError;
use crate::provider::UserId;
use crate::quota::Category;
use crate::store::MessagedStore;

/// Insertion-ordered set with an optional size cap
#[derive(Debug, Default)]
struct Ledger {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl Ledger {
    fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    fn insert(&mut self, id: &str, cap: Option<usize>) {
        if !self.seen.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());

        if let Some(cap) = cap {
            while self.order.len() > cap {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        if !self.seen.remove(id) {
            return false;
        }
        self.order.retain(|entry| entry != id);
        true
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

pub struct DuplicateTracker {
    memory: HashMap<Category, Ledger>,
    messaged: MessagedStore,
    max_entries: Option<usize>,
}

impl DuplicateTracker {
    /// Create a tracker around an already loaded messaged-user store
    pub fn new(messaged: MessagedStore) -> Self {
        Self {
            memory: HashMap::new(),
            messaged,
            max_entries: None,
        }
    }

    /// Cap each in-memory category at `max_entries`, evicting the oldest ids
    ///
    /// The persistent messaged-user set is never capped. Follows are exempt
    /// too: they mark a pending unfollow rather than a past action.
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn has_acted(&self, category: Category, id: &str) -> bool {
        match category {
            Category::Dms => id
                .parse::<UserId>()
                .map(|user_id| self.messaged.contains(user_id))
                .unwrap_or(false),
            _ => self
                .memory
                .get(&category)
                .is_some_and(|ledger| ledger.contains(id)),
        }
    }

    pub fn has_messaged(&self, user_id: UserId) -> bool {
        self.messaged.contains(user_id)
    }

    /// Remember that `id` was acted on in `category`
    ///
    /// For [`Category::Dms`] the id must be a numeric user id and is appended
    /// to the persistent store.
    pub fn record(&mut self, category: Category, id: &str) -> Result<(), StoreError> {
        match category {
            Category::Dms => {
                let user_id = id.parse::<UserId>().map_err(|_| StoreError::Append {
                    path: self.messaged.path().display().to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("not a numeric user id: {}", id),
                    ),
                })?;
                self.record_messaged(user_id)
            }
            Category::Follows => {
                self.memory.entry(category).or_default().insert(id, None);
                Ok(())
            }
            _ => {
                self.memory
                    .entry(category)
                    .or_default()
                    .insert(id, self.max_entries);
                Ok(())
            }
        }
    }

    pub fn record_messaged(&mut self, user_id: UserId) -> Result<(), StoreError> {
        self.messaged.record(user_id).map(|_| ())
    }

    /// Drop `id` from an in-memory category
    ///
    /// Returns whether the id was present. The messaged-user set only grows.
    pub fn forget(&mut self, category: Category, id: &str) -> Result<bool, StoreError> {
        if category == Category::Dms {
            return Err(StoreError::AppendOnly(category.to_string()));
        }
        let removed = self
            .memory
            .get_mut(&category)
            .is_some_and(|ledger| ledger.remove(id));
        if removed {
            debug!("Forgot {} from {}", id, category);
        }
        Ok(removed)
    }

    /// Number of ids remembered for a category
    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::Dms => self.messaged.len(),
            _ => self.memory.get(&category).map_or(0, Ledger::len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tracker(temp_dir: &TempDir) -> DuplicateTracker {
        let store = MessagedStore::load(temp_dir.path().join("messaged.txt")).unwrap();
        DuplicateTracker::new(store)
    }

    #[test]
    fn test_record_then_has_acted() {
        let temp_dir = TempDir::new().unwrap();
        let mut tracker = tracker(&temp_dir);

        assert!(!tracker.has_acted(Category::Likes, "post-1"));
        tracker.record(Category::Likes, "post-1").unwrap();
        assert!(tracker.has_acted(Category::Likes, "post-1"));
    }

    #[test]
    fn test_categories_do_not_share_ids() {
        let temp_dir = TempDir::new().unwrap();
        let mut tracker = tracker(&temp_dir);

        tracker.record(Category::Likes, "post-1").unwrap();
        assert!(!tracker.has_acted(Category::Comments, "post-1"));
    }

    #[test]
    fn test_forget_removes_follow() {
        let temp_dir = TempDir::new().unwrap();
        let mut tracker = tracker(&temp_dir);

        tracker.record(Category::Follows, "target").unwrap();
        assert!(tracker.forget(Category::Follows, "target").unwrap());
        assert!(!tracker.has_acted(Category::Follows, "target"));
        assert!(!tracker.forget(Category::Follows, "target").unwrap());
    }

    #[test]
    fn test_dms_are_persistent_and_append_only() {
        let temp_dir = TempDir::new().unwrap();
        let mut tracker = tracker(&temp_dir);

        tracker.record(Category::Dms, "99").unwrap();
        assert!(tracker.has_acted(Category::Dms, "99"));
        assert!(tracker.has_messaged(99));
        assert!(matches!(
            tracker.forget(Category::Dms, "99"),
            Err(StoreError::AppendOnly(_))
        ));

        let reloaded = self::tracker(&temp_dir);
        assert!(reloaded.has_messaged(99));
    }

    #[test]
    fn test_dms_reject_non_numeric_id() {
        let temp_dir = TempDir::new().unwrap();
        let mut tracker = tracker(&temp_dir);

        assert!(tracker.record(Category::Dms, "alice").is_err());
        assert!(!tracker.has_acted(Category::Dms, "alice"));
    }

    #[test]
    fn test_cap_evicts_oldest_first() {
        let temp_dir = TempDir::new().unwrap();
        let mut tracker = tracker(&temp_dir).with_max_entries(Some(2));

        tracker.record(Category::StoryViews, "a").unwrap();
        tracker.record(Category::StoryViews, "b").unwrap();
        tracker.record(Category::StoryViews, "c").unwrap();

        assert_eq!(tracker.len(Category::StoryViews), 2);
        assert!(!tracker.has_acted(Category::StoryViews, "a"));
        assert!(tracker.has_acted(Category::StoryViews, "b"));
        assert!(tracker.has_acted(Category::StoryViews, "c"));
    }

    #[test]
    fn test_cap_never_evicts_follows() {
        let temp_dir = TempDir::new().unwrap();
        let mut tracker = tracker(&temp_dir).with_max_entries(Some(1));

        tracker.record(Category::Follows, "first").unwrap();
        tracker.record(Category::Follows, "second").unwrap();
        tracker.record(Category::Likes, "post-1").unwrap();
        tracker.record(Category::Likes, "post-2").unwrap();

        assert_eq!(tracker.len(Category::Follows), 2);
        assert!(tracker.has_acted(Category::Follows, "first"));
        assert_eq!(tracker.len(Category::Likes), 1);
        assert!(!tracker.has_acted(Category::Likes, "post-1"));
    }

    #[test]
    fn test_uncapped_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let mut tracker = tracker(&temp_dir);

        for i in 0..1000 {
            tracker.record(Category::Likes, &format!("post-{}", i)).unwrap();
        }
        assert_eq!(tracker.len(Category::Likes), 1000);
        assert!(tracker.has_acted(Category::Likes, "post-0"));
    }
}
