//! Logging setup.
//!
//! Logs go to stderr, as pretty text or JSON lines. With `LOG_DIR` set they
//! are also written to a daily-rolling file through a non-blocking writer.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::EtlError;

/// Prefix of the rolling log files.
const LOG_FILE_PREFIX: &str = "movies-etl.log";

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Handle on the installed subscriber.
///
/// Buffered file output is flushed when the handle is dropped, so keep it
/// alive until the process exits.
pub struct Telemetry {
    _file_guard: Option<WorkerGuard>,
}

impl Telemetry {
    /// Install the global subscriber from `LOG_FORMAT`, `LOG_DIR` and `RUST_LOG`.
    pub fn from_env() -> Result<Self, EtlError> {
        let format = env::var("LOG_FORMAT")
            .ok()
            .map(|raw| raw.parse::<LogFormat>())
            .transpose()
            .map_err(EtlError::config)?
            .unwrap_or_default();
        let log_dir = env::var("LOG_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Self::init(format, log_dir)
    }

    /// Install the global subscriber.
    pub fn init(format: LogFormat, log_dir: Option<PathBuf>) -> Result<Self, EtlError> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let (file_layer, file_guard) = match log_dir {
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                let (writer, guard) =
                    tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
                let layer = fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        let registry = tracing_subscriber::registry().with(filter).with(file_layer);
        let installed = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init(),
        };
        installed.map_err(|e| EtlError::TelemetryError(e.to_string()))?;

        Ok(Self {
            _file_guard: file_guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
