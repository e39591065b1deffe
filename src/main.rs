//! APK cache cleaner binary.
//!
//! Intended to be invoked as a periodic background job; its only observable
//! effects are the resulting cache state, the exit code, and logs.

use apkcache_cleaner::{Cleaner, Outcome};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Garbage-collect an APK content cache.
#[derive(Debug, Parser)]
#[command(name = "apkcache", version, about)]
struct Args {
    /// Cache root directory (contains `index.db` and `files/`).
    cache_root: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    match Cleaner::new(args.cache_root).run().await {
        Ok(Outcome::Cleaned) => {
            tracing::info!("cache clean complete");
            ExitCode::SUCCESS
        },
        Ok(Outcome::Deferred) => {
            tracing::info!("cache in use, nothing cleaned");
            ExitCode::SUCCESS
        },
        Err(error) => {
            tracing::error!(?error, "cache clean failed");
            ExitCode::FAILURE
        },
    }
}
