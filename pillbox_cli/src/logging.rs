//! Tracing setup: console layer on stderr plus an optional rolling file sink.

use crate::cli::FILE_GUARD;
use pillbox_config::Logging;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// `never` when unset. Unknown values are rejected by `Config::validate`.
fn rotation_of(cfg: &Logging) -> Rotation {
    match cfg.rotation.as_deref() {
        Some("daily") => Rotation::DAILY,
        Some("hourly") => Rotation::HOURLY,
        _ => Rotation::NEVER,
    }
}

/// `RUST_LOG` wins over `--log-level`; a bad directive falls back to `info`.
fn console_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(level: &str, json: bool, cfg: &Logging) -> eyre::Result<()> {
    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter(level))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter(level))
            .boxed()
    };

    let file = match cfg.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {:?} has no file name", path))?;
            std::fs::create_dir_all(dir)
                .map_err(|e| eyre::eyre!("create log directory {:?}: {}", dir, e))?;
            let appender = RollingFileAppender::new(rotation_of(cfg), dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_level = cfg.level.as_deref().unwrap_or("info");
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(
                        EnvFilter::try_new(file_level).unwrap_or_else(|_| EnvFilter::new("info")),
                    )
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("install tracing subscriber: {}", e))
}
