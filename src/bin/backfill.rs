use automkt::cli::{parse_limit_arg, BACKFILL_USAGE};
use automkt::config::Config;
use automkt::db::Repository;
use automkt::error::Result;
use automkt::pipeline::run_configured_backfill;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    automkt::init_tracing();

    let limit_override = match parse_limit_arg(std::env::args().skip(1)) {
        Ok(limit) => limit,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            eprintln!("{}", BACKFILL_USAGE);
            return;
        }
    };

    let config = Config::load();
    // Flag, then IMAGE_PROCESSING_LIMIT, then the built-in default
    let limit = limit_override.unwrap_or(config.image_processing_limit);

    if let Err(e) = run(&config, limit).await {
        tracing::error!("Image backfill aborted by a fatal error: {}", e);
    }
}

async fn run(config: &Config, limit: usize) -> Result<()> {
    let store = Repository::new(&config.db_path).await?;
    let summary = run_configured_backfill(config, &store, limit).await?;

    tracing::info!(
        "Selected {} article(s): {} image(s) generated, {} failed",
        summary.selected,
        summary.generated,
        summary.failed
    );
    Ok(())
}
