use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::{LogFormat, LogRotation, LoggingConfig};

// Holds the appender's flush guard for the life of the process; dropping it
// would stop the background writer.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. An explicit `logging.level` in config wins
/// over `RUST_LOG`; with neither set the server logs at `info`. File output
/// is layered on only when enabled and the directory is usable.
pub fn init_with_config(cfg: &LoggingConfig) {
    let filter = match cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let file_writer = if cfg.enable_file_logging {
        open_rolling_file(cfg)
    } else {
        None
    };

    let timer = UtcTime::rfc_3339();
    match cfg.format {
        LogFormat::Json => {
            let stdout = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_timer(timer.clone());
            let file = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(timer)
                    .with_writer(writer)
            });
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .with(file)
                .try_init();
        }
        LogFormat::Text => {
            let stdout = tracing_subscriber::fmt::layer().with_timer(timer.clone());
            let file = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_timer(timer)
                    .with_writer(writer)
            });
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .with(file)
                .try_init();
        }
    }
}

/// Non-blocking writer over a rolling file, or `None` when the directory
/// cannot be prepared (the server then runs on stdout alone).
fn open_rolling_file(cfg: &LoggingConfig) -> Option<NonBlocking> {
    if let Err(err) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!("log dir '{}' unusable ({err}); writing to stdout only", cfg.dir);
        return None;
    }

    let rotation = match cfg.rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    };
    let appender = RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Some(writer)
}
