use automkt::ai::{InsightExtractor, InsightSource};
use automkt::config::Config;
use automkt::db::Repository;
use automkt::error::Result;
use automkt::feed::FeedFetcher;
use automkt::pipeline::{run_configured_backfill, run_ingest};
use automkt::report::{PlainTextFormatter, ReportFormatter};
use automkt::services::{deliver, ConsoleSender, ReportSender, WebhookSender};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    automkt::init_tracing();

    let config = Config::load();

    tracing::info!("Ingest run started");
    if let Err(e) = run(&config).await {
        tracing::error!("Ingest run aborted by a fatal error: {}", e);
    }
    tracing::info!("Ingest run finished");
}

async fn run(config: &Config) -> Result<()> {
    let store = Repository::new(&config.db_path).await?;

    if config.rss_feeds.is_empty() {
        tracing::warn!("No RSS feeds configured (RSS_FEED_1, RSS_FEED_2, ...); nothing to do");
        return Ok(());
    }

    let fetcher = FeedFetcher::new()?;
    let extractor = match &config.gemini_api_key {
        Some(key) => {
            let extractor = InsightExtractor::new(key.clone(), config.text_model.clone())?;
            tracing::info!("Text model: {}", extractor.model());
            Some(extractor)
        }
        None => None,
    };

    let outcome = run_ingest(
        &config.rss_feeds,
        &fetcher,
        extractor.as_ref().map(|e| e as &dyn InsightSource),
        &store,
    )
    .await;

    tracing::info!(
        "Processed {} articles: {} new, {} already stored, {} failed",
        outcome.entries.len(),
        outcome.inserted,
        outcome.duplicates,
        outcome.failed
    );

    if !outcome.entries.is_empty() {
        let report = PlainTextFormatter.format(&outcome.entries);
        deliver(&senders(config), &report).await;
    }

    if config.generate_images_on_ingest {
        match run_configured_backfill(config, &store, config.image_processing_limit).await {
            Ok(summary) => tracing::info!("Image backfill: {:?}", summary),
            Err(e) => tracing::error!("Image backfill aborted: {}", e),
        }
    }

    Ok(())
}

fn senders(config: &Config) -> Vec<Box<dyn ReportSender>> {
    let mut senders: Vec<Box<dyn ReportSender>> = vec![Box::new(ConsoleSender)];

    if let Some(url) = &config.webhook_url {
        match WebhookSender::new(url.clone()) {
            Ok(sender) => senders.push(Box::new(sender)),
            Err(e) => tracing::warn!("Webhook delivery disabled: {}", e),
        }
    }

    senders
}
