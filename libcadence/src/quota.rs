//! Per-category action ceilings
//!
//! The quota gate is a pure comparison: a pass keeps its own counter and asks
//! whether one more action is allowed before every remote call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Engagement action categories
///
/// The same category keys both the quota map and the duplicate tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    StoryViews,
    Likes,
    Comments,
    Follows,
    Dms,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::StoryViews,
        Category::Likes,
        Category::Comments,
        Category::Follows,
        Category::Dms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::StoryViews => "story_views",
            Category::Likes => "likes",
            Category::Comments => "comments",
            Category::Follows => "follows",
            Category::Dms => "dms",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "story_views" => Ok(Category::StoryViews),
            "likes" => Ok(Category::Likes),
            "comments" => Ok(Category::Comments),
            "follows" => Ok(Category::Follows),
            "dms" => Ok(Category::Dms),
            _ => Err(format!(
                "Invalid category: '{}'. Valid options: story_views, likes, comments, follows, dms",
                s
            )),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric ceilings per category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    limits: HashMap<Category, u32>,
}

impl Quota {
    /// Create a quota from explicit limits
    ///
    /// Categories missing from `limits` have a ceiling of zero.
    pub fn new(limits: HashMap<Category, u32>) -> Self {
        Self { limits }
    }

    /// Replace the ceiling for one category
    pub fn with_limit(mut self, category: Category, limit: u32) -> Self {
        self.limits.insert(category, limit);
        self
    }

    /// Ceiling for a category (zero when unset)
    pub fn limit(&self, category: Category) -> u32 {
        self.limits.get(&category).copied().unwrap_or(0)
    }

    /// Check whether another action in `category` is allowed
    ///
    /// Returns true iff `count` is still below the ceiling.
    pub fn within_limit(&self, category: Category, count: u32) -> bool {
        count < self.limit(category)
    }
}

impl Default for Quota {
    fn default() -> Self {
        let limits = HashMap::from([
            (Category::Likes, 100),
            (Category::Comments, 40),
            (Category::StoryViews, 200),
            (Category::Follows, 10),
            (Category::Dms, 20),
        ]);
        Self { limits }
    }
}
