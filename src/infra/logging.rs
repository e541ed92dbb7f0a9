use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::infra::{config::LogConfig, error::AppError};

const DEFAULT_LOG_FILE_NAME: &str = "chatsync.log";

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Keep the returned guard alive for as long as logs should reach the file.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match config.file.as_deref() {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(file_layer)
        .try_init()
        .map_err(|error| AppError::LoggingInit(Box::new(error)))?;

    Ok(guard)
}

fn file_appender(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.into());

    tracing_appender::rolling::never(directory, file_name)
}
