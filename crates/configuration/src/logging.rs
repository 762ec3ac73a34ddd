use crate::error::ConfigError;
use crate::settings::LoggingSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Prefix of the daily rolling log files.
const LOG_FILE_PREFIX: &str = "finsight.log";

/// The filter used when `RUST_LOG` is not set.
pub fn default_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug,hyper=info,sqlx=info")
        } else {
            EnvFilter::new("info,tower_http=info,sqlx=warn")
        }
    })
}

/// Installs the global tracing subscriber.
///
/// Logs always go to stdout. When `settings.directory` is set, a second layer
/// writes them to a daily rolling file; the returned guard flushes that file
/// and must be kept alive for as long as the process logs.
pub fn init_tracing(
    settings: &LoggingSettings,
    debug: bool,
) -> Result<Option<WorkerGuard>, ConfigError> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(default_filter(debug));

    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(default_filter(debug));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::LoggingError(e.to_string()))?;

    Ok(guard)
}
