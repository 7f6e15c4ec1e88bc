use crate::ai::InsightSource;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::FeedSource;
use crate::models::{FeedItem, NewArticle, ReportEntry};

/// What one ingest run produced.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Every processed article in feed order, including duplicates and failures.
    pub entries: Vec<ReportEntry>,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Fetches every feed, extracts points for each item and stores new articles.
///
/// Without an extractor the items are reported without points and nothing is
/// stored, so a later run with a model configured still picks them up.
pub async fn run_ingest(
    feeds: &[String],
    fetcher: &dyn FeedSource,
    extractor: Option<&dyn InsightSource>,
    store: &Repository,
) -> IngestOutcome {
    let mut items = Vec::new();
    for url in feeds {
        tracing::info!("Fetching articles from {}", url);
        let fetched = fetcher.fetch(url).await;
        tracing::info!("Collected {} articles from {}", fetched.len(), url);
        items.extend(fetched);
    }

    let mut outcome = IngestOutcome::default();
    if items.is_empty() {
        tracing::info!("No articles collected");
        return outcome;
    }

    let Some(extractor) = extractor else {
        tracing::error!("No text model configured; reporting articles without points");
        outcome.entries = items
            .iter()
            .map(|item| ReportEntry::new(item, Vec::new()))
            .collect();
        return outcome;
    };

    for item in &items {
        match process_item(item, extractor, store).await {
            Ok((entry, inserted)) => {
                if inserted {
                    tracing::info!("Stored article '{}'", item.title);
                    outcome.inserted += 1;
                } else {
                    tracing::info!("Article already stored: '{}' ({})", item.title, item.link);
                    outcome.duplicates += 1;
                }
                outcome.entries.push(entry);
            }
            Err(e) => {
                tracing::error!("Failed to process '{}': {}", item.title, e);
                outcome.failed += 1;
                outcome.entries.push(ReportEntry::failed(item, e));
            }
        }
    }

    outcome
}

async fn process_item(
    item: &FeedItem,
    extractor: &dyn InsightSource,
    store: &Repository,
) -> Result<(ReportEntry, bool)> {
    let points = extractor.extract(&item.title, &item.summary).await;

    let article = NewArticle {
        title: item.title.clone(),
        link: item.link.clone(),
        summary: (!item.summary.is_empty()).then(|| item.summary.clone()),
        insight_points: points.clone(),
    };
    let inserted = store.insert_if_absent(&article).await?;

    Ok((ReportEntry::new(item, points), inserted))
}
