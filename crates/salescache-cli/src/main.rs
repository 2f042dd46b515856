//! salescache - inspect and warm the offline sales cache from a terminal.
//!
//! Commands:
//!   login [username]     authenticate, store the session, warm the cache
//!   warmup               force-refresh every entity
//!   get <entity> [--force] [--include-inactive]
//!   invalidate <entity>
//!   whoami
//!   logout               clear the session and every cached entity

mod app;

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, Command};
use salescache_core::Config;

/// Log file prefix inside the cache directory
const LOG_FILE_NAME: &str = "salescache.log";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit so logs flush.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn print_usage() {
    eprintln!("Usage: salescache <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login [username]                              Log in and warm the cache");
    eprintln!("  warmup                                        Force-refresh every entity");
    eprintln!("  get <entity> [--force] [--include-inactive]   Print an entity as JSON");
    eprintln!("  invalidate <entity>                           Drop an entity from the cache");
    eprintln!("  whoami                                        Show the current identity");
    eprintln!("  logout                                        Clear session and cache");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            print_usage();
            std::process::exit(2);
        }
    };

    let config = Config::load()?;
    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)?;

    let _guard = init_tracing(Some(&cache_dir));
    info!(cache_dir = %cache_dir.display(), "salescache starting");

    let mut app = App::new(config, cache_dir)?;
    app.run(command).await
}
