//! Tracing setup for the scanner binary.
//!
//! Stdout carries the event stream, so no log layer writes there:
//! - **Production**: JSON lines in a daily rolling file, compact text on stderr
//! - **Development**: pretty text on stderr

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flush guards for the non-blocking writers; dropped only at exit.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDERR_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Environment variable holding the fallback filter when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "LANTERN_LOG_LEVEL";

const LOG_FILE_PREFIX: &str = "lantern";

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG`, then `LANTERN_LOG_LEVEL`, then `info`.
/// Production mode writes JSON to daily files under [`log_directory`] and
/// compact uncoloured text to stderr; development mode writes pretty text to
/// stderr.
///
/// # Errors
///
/// Returns an error if the filter cannot be parsed, or in production mode if
/// the log directory or log file cannot be created.
pub fn init(is_production: bool) -> anyhow::Result<()> {
    let fallback = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .with_context(|| format!("Invalid log filter '{fallback}'"))?;

    if is_production {
        init_production(env_filter)
    } else {
        init_development(env_filter);
        Ok(())
    }
}

fn init_production(env_filter: EnvFilter) -> anyhow::Result<()> {
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender(&log_directory())?);
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stderr_writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDERR_GUARD.set(stderr_guard);
    Ok(())
}

fn init_development(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Daily rolling appender writing `lantern.<date>` files into `log_dir`,
/// creating the directory first.
fn file_appender(log_dir: &Path) -> anyhow::Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))
}

/// Where production logs go on this platform.
#[must_use]
pub fn log_directory() -> PathBuf {
    if cfg!(target_os = "linux") {
        return PathBuf::from("/var/log/lantern");
    }
    directories::ProjectDirs::from("", "", "lantern")
        .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
}
