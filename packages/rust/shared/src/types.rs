//! Core domain types for newssync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NewsItem
// ---------------------------------------------------------------------------

/// A single piece of content from one source.
///
/// The `id` is the source-scoped stable identifier, monotonically increasing
/// with publication order. Two items are the same item exactly when they share
/// a source title and an id; content fields never participate in equality, so
/// an upstream edit to a headline does not turn an old item into a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    /// Stable identifier, unique and increasing within the source.
    pub id: u64,
    /// Title of the source this item came from.
    pub source: String,
    /// Canonical URL of the item.
    pub url: String,
    /// Headline, if one was extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Main text, if one was extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// When the item was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl PartialEq for NewsItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.source == other.source
    }
}

impl Eq for NewsItem {}

impl std::fmt::Display for NewsItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.source, self.id)
    }
}
