//! Logging configuration with journald support on Linux.
//!
//! Sets up tracing-based logging that integrates with systemd's journal on
//! Linux, with a daily log file or stderr as the fallback.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log output goes when journald is not used.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Daily-rolling file in the given directory (default: data dir).
    File(Option<PathBuf>),
    Stderr,
}

/// Initialize the logging system.
///
/// Log level is read from the `PHOTOCAT_LOG` environment variable
/// (`debug`, `info`, `warn`, `error`), defaulting to `info`.
pub fn init(target: LogTarget) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("PHOTOCAT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if matches!(target, LogTarget::File(_)) {
            if let Ok(journald_layer) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(journald_layer)
                    .try_init()?;

                tracing::debug!("Logging initialized with journald backend");
                return Ok(());
            }
        }
    }

    let log_dir = match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
            return Ok(());
        }
        LogTarget::File(dir) => dir.unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("photocat")
                .join("logs")
        }),
    };

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "photocat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the life of the process; init runs once.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::debug!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}
