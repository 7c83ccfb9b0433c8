//! Console and file log sinks

use anyhow::{Context, Result};
use ferrolift_config::{ConfigLoader, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Environment variable that overrides every other level setting
pub const LOG_LEVEL_ENV: &str = "FERROLIFT_LOG_LEVEL";

/// Level used when the environment does not set one
pub fn effective_level<'a>(config: &'a LoggingConfig, debug: bool, quiet: bool) -> &'a str {
    if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        config.level.as_str()
    }
}

/// Where the file sink writes; relative paths resolve against `base`
pub fn log_file_path(config: &LoggingConfig, base: &Path) -> Option<PathBuf> {
    if !config.enable_file_logging || config.log_file.as_os_str().is_empty() {
        return None;
    }
    if config.log_file.is_absolute() {
        Some(config.log_file.clone())
    } else {
        Some(base.join(&config.log_file))
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file sink when dropped and must live until
/// the process exits.
pub fn init_logging(config: &LoggingConfig, debug: bool, quiet: bool) -> Result<Option<WorkerGuard>> {
    let level = effective_level(config, debug, quiet);
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))?;

    let base = ConfigLoader::executable_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut guard = None;
    let file_layer: Option<Box<dyn Layer<Registry> + Send + Sync>> = match log_file_path(config, &base) {
        Some(path) => {
            let directory = path.parent().map_or_else(|| base.clone(), Path::to_path_buf);
            let file_name = path
                .file_name()
                .context("log file path has no file name")?
                .to_owned();
            std::fs::create_dir_all(&directory)
                .with_context(|| format!("cannot create log directory {}", directory.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, flush_guard) = tracing_appender::non_blocking(appender);
            guard = Some(flush_guard);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            Some(if config.json_format {
                layer.json().boxed()
            } else {
                layer.boxed()
            })
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .try_init()
        .context("logging is already initialized")?;

    Ok(guard)
}
