//! Logging setup, powered by tracing-subscriber.
//!
//! Events go through a non-blocking stdout writer. The returned guard flushes
//! pending lines on drop and must live as long as the process.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Default directives when `RUST_LOG` is unset; quiets noisy dependencies.
const DEFAULT_FILTER: &str = "info,sled=warn,hyper=warn,reqwest=warn";

pub fn init_logging(
    format: LogFormat,
) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);

    match format {
        LogFormat::Compact => builder.compact().try_init()?,
        LogFormat::Json => builder.json().with_current_span(false).try_init()?,
    }

    Ok(guard)
}
