// Hacker News API response types.
// Defines structs for deserializing the item, user, list, and search endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HnError, Result};

/// Item kind discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[default]
    Story,
    Comment,
    Job,
    Poll,
    PollOpt,
    #[serde(other)]
    Unknown,
}

/// A story, comment, job, poll, or poll option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    pub by: Option<String>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub time: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub score: Option<i64>,
    /// Total comment count, for stories and polls.
    pub descendants: Option<u64>,
    pub parent: Option<u64>,
    pub poll: Option<u64>,
    /// Child comment ids in ranked display order.
    #[serde(default)]
    pub kids: Vec<u64>,
    /// Poll option ids.
    #[serde(default)]
    pub parts: Vec<u64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

impl Item {
    /// Synthetic stand-in for an item that could not be resolved.
    pub fn placeholder(id: u64) -> Self {
        Self {
            id,
            item_type: ItemType::Comment,
            deleted: true,
            ..Self::default()
        }
    }

    /// Deleted or dead items are not shown.
    pub fn is_removed(&self) -> bool {
        self.deleted || self.dead
    }

    /// Check that the payload describes the item that was asked for.
    pub fn validate(&self, requested: u64) -> Result<()> {
        if self.id != requested {
            return Err(HnError::Validation(format!(
                "requested item {} but received item {}",
                requested, self.id
            )));
        }
        Ok(())
    }
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    pub karma: i64,
    pub about: Option<String>,
    #[serde(default)]
    pub submitted: Vec<u64>,
}

impl User {
    pub fn validate(&self, requested: &str) -> Result<()> {
        if self.id != requested {
            return Err(HnError::Validation(format!(
                "requested user {} but received user {}",
                requested, self.id
            )));
        }
        Ok(())
    }
}

/// Recently changed items and profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Updates {
    #[serde(default)]
    pub items: Vec<u64>,
    #[serde(default)]
    pub profiles: Vec<String>,
}

/// Ranked story id lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryList {
    Top,
    New,
    Best,
    Ask,
    Show,
    Job,
}

impl StoryList {
    pub const ALL: [StoryList; 6] = [
        StoryList::Top,
        StoryList::New,
        StoryList::Best,
        StoryList::Ask,
        StoryList::Show,
        StoryList::Job,
    ];

    /// Short name used on the command line and in cache keys.
    pub fn name(&self) -> &'static str {
        match self {
            StoryList::Top => "top",
            StoryList::New => "new",
            StoryList::Best => "best",
            StoryList::Ask => "ask",
            StoryList::Show => "show",
            StoryList::Job => "job",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|list| list.name() == name)
    }

    /// Endpoint path relative to the API base.
    pub fn path(&self) -> String {
        format!("{}stories.json", self.name())
    }
}

/// A search hit from the Algolia search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub points: Option<i64>,
    pub num_comments: Option<u64>,
    #[serde(
        rename = "created_at_i",
        default,
        with = "chrono::serde::ts_seconds_option"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    #[serde(rename = "nbHits", default)]
    pub total_hits: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(rename = "nbPages", default)]
    pub total_pages: u32,
}
