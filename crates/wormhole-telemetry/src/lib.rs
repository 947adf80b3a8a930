//! Process-wide logging setup shared by the Wormhole binaries.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use typed_builder::TypedBuilder;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened to the top level.
    #[default]
    Json,
    /// Human readable, for local development.
    Text,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Text => write!(f, "text"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct TelemetrySettings {
    /// Name logged once at start-up so aggregated logs can be told apart.
    #[builder(setter(into))]
    pub service: String,
    #[builder(default)]
    pub format: LogFormat,
    /// Default level; `RUST_LOG` directives take precedence.
    #[builder(default = LevelFilter::INFO)]
    pub level: LevelFilter,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unknown log format '{0}'; expected json or text")]
    UnknownFormat(String),
    #[error("failed to bridge log records: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Builds the event filter: `RUST_LOG` if set and valid, `level` otherwise.
pub fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Installs the global tracing subscriber and routes `log` records from
/// dependencies (sqlx, lapin) into it. Call once, before anything logs.
pub fn init(settings: &TelemetrySettings) -> Result<(), TelemetryError> {
    tracing_log::LogTracer::init()?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(settings.level))
        .with_target(true);

    match settings.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            builder
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish(),
        )?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }

    info!(
        service = %settings.service,
        format = %settings.format,
        level = %settings.level,
        "telemetry initialized"
    );
    Ok(())
}
