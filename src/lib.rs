pub mod ai;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

/// Logs go to stderr so stdout carries only the report. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
