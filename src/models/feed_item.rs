use chrono::{DateTime, Utc};

/// An entry pulled from a feed. Lives only for the duration of one ingest run.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub source_url: String,
}
