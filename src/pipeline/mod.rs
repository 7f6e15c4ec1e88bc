mod backfill;
mod ingest;

pub use backfill::{image_path, image_subject, run_backfill, run_configured_backfill, BackfillReport};
pub use ingest::{run_ingest, IngestOutcome};
