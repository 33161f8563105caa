//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Choose between human-readable and JSON output
//! - Optionally mirror log lines to a rotating file
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - The file sink is written from a background worker and never carries ANSI
//!   colour codes; the returned guard flushes it on drop

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LogRotation, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter `{directive}`: {reason}")]
    Filter { directive: String, reason: String },

    #[error("cannot open log file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: InitError,
    },

    #[error("a global subscriber is already installed: {0}")]
    Install(String),
}

/// Install the global subscriber described by `config`.
///
/// When a log file is configured, the returned guard must be held for as long
/// as the process logs; dropping it flushes and stops the file writer.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::Filter {
            directive: config.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let (writer, guard) = match &config.file {
        Some(path) => {
            let appender = rolling_appender(path, config.rotation, config.max_log_files)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let installed = match config.format {
        LogFormat::Json => {
            let file_layer = writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .with(file_layer)
                .try_init()
        }
        LogFormat::Pretty => {
            let file_layer = writer.map(|w| fmt::layer().with_ansi(false).with_writer(w));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true))
                .with(file_layer)
                .try_init()
        }
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))?;

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        file = ?config.file,
        rotation = ?config.rotation,
        max_log_files = config.max_log_files,
        "Logging initialized"
    );
    Ok(guard)
}

fn rotation(policy: LogRotation) -> Rotation {
    match policy {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    }
}

/// File appender for `path`. The file name becomes the prefix of each
/// rotated file, which lands next to it.
fn rolling_appender(
    path: &Path,
    policy: LogRotation,
    max_log_files: usize,
) -> Result<RollingFileAppender, LoggingError> {
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rest-dispatch.log".to_string());

    RollingFileAppender::builder()
        .rotation(rotation(policy))
        .filename_prefix(prefix)
        .max_log_files(max_log_files)
        .build(directory)
        .map_err(|source| LoggingError::File {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_names(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_bad_file_path_is_reported() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let config = LoggingConfig {
            file: Some(blocker.path().join("app.log")),
            ..LoggingConfig::default()
        };
        assert!(matches!(init_logging(&config), Err(LoggingError::File { .. })));
    }

    #[test]
    fn test_policy_maps_to_appender_rotation() {
        assert_eq!(rotation(LogRotation::Never), Rotation::NEVER);
        assert_eq!(rotation(LogRotation::Hourly), Rotation::HOURLY);
        assert_eq!(rotation(LogRotation::Daily), Rotation::DAILY);
    }

    #[test]
    fn test_daily_file_carries_date_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender =
            rolling_appender(&dir.path().join("app.log"), LogRotation::Daily, 3).unwrap();
        appender.write_all(b"first line\n").unwrap();
        appender.flush().unwrap();

        let names = file_names(dir.path());
        assert_eq!(names.len(), 1);
        let suffix = names[0].strip_prefix("app.log.").unwrap();
        assert_eq!(suffix.split('-').count(), 3, "{suffix}");
    }

    #[test]
    fn test_hourly_file_carries_hour_suffix() {
        let dir = tempfile::tempdir().unwrap();
        rolling_appender(&dir.path().join("app.log"), LogRotation::Hourly, 3).unwrap();

        let names = file_names(dir.path());
        let suffix = names[0].strip_prefix("app.log.").unwrap();
        assert_eq!(suffix.split('-').count(), 4, "{suffix}");
    }

    #[test]
    fn test_unrotated_file_keeps_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender =
            rolling_appender(&dir.path().join("app.log"), LogRotation::Never, 3).unwrap();
        appender.write_all(b"line\n").unwrap();
        appender.flush().unwrap();
        assert_eq!(file_names(dir.path()), vec!["app.log".to_string()]);
    }
}
