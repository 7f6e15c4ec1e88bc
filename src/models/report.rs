use super::FeedItem;

/// One processed article as it appears in the run report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub title: String,
    pub link: String,
    pub points: Vec<String>,
}

impl ReportEntry {
    pub fn new(item: &FeedItem, points: Vec<String>) -> Self {
        Self {
            title: item.title.clone(),
            link: item.link.clone(),
            points,
        }
    }

    /// Placeholder for an article whose processing failed part-way.
    pub fn failed(item: &FeedItem, error: impl std::fmt::Display) -> Self {
        Self::new(item, vec![format!("Processing/storage error: {}", error)])
    }
}
