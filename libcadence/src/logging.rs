//! Logging setup for the Cadence daemon
//!
//! Every engine event is a `tracing` event; this module only decides where
//! and how they are rendered. Output always goes to stderr. The level comes
//! from `RUST_LOG` when set, otherwise from `CADENCE_LOG_LEVEL` (or `debug`
//! under `--verbose`), otherwise `info`.
//!
//! ```no_run
//! use libcadence::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "cadence=debug,info").init();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const ENV_LOG_FORMAT: &str = "CADENCE_LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "CADENCE_LOG_LEVEL";

const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines, suited to journald and log files
    #[default]
    Text,
    /// One JSON object per event for log shippers
    Json,
    /// Multi-line colored output with source locations
    Pretty,
}

impl LogFormat {
    const NAMES: [(&'static str, LogFormat); 3] = [
        ("text", LogFormat::Text),
        ("json", LogFormat::Json),
        ("pretty", LogFormat::Pretty),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, format)| *format)
            .ok_or_else(|| {
                format!(
                    "Invalid log format: '{}'. Valid options: text, json, pretty",
                    s
                )
            })
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// An `EnvFilter` directive such as `info` or `libcadence=debug,warn`
    pub directive: String,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, directive: impl Into<String>) -> Self {
        Self {
            format,
            directive: directive.into(),
        }
    }

    /// Build from `CADENCE_LOG_FORMAT` / `CADENCE_LOG_LEVEL` through `lookup`
    ///
    /// `verbose` overrides the configured level with `debug`. An invalid
    /// format falls back to text and is returned as a warning, since no
    /// subscriber exists yet to report it.
    pub fn from_lookup<F>(lookup: F, verbose: bool) -> (Self, Option<String>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let (format, warning) = match lookup(ENV_LOG_FORMAT).filter(|v| !v.trim().is_empty()) {
            Some(raw) => match raw.parse::<LogFormat>() {
                Ok(format) => (format, None),
                Err(e) => (LogFormat::Text, Some(e)),
            },
            None => (LogFormat::Text, None),
        };

        let directive = if verbose {
            "debug".to_string()
        } else {
            lookup(ENV_LOG_LEVEL)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
        };

        (Self::new(format, directive), warning)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.directive))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
    }

    /// Install the global subscriber
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber is already installed.
    pub fn init(&self) {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr);

        match self.format {
            LogFormat::Text => builder.with_target(false).with_ansi(false).init(),
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .init(),
            LogFormat::Pretty => builder.pretty().with_file(true).with_line_number(true).init(),
        }
    }
}

/// Initialize logging from the process environment
///
/// ```bash
/// CADENCE_LOG_FORMAT=json CADENCE_LOG_LEVEL=debug cadence-run --snapshot account.json
/// ```
pub fn init_default(verbose: bool) {
    let (config, warning) = LoggingConfig::from_lookup(|key| std::env::var(key).ok(), verbose);
    config.init();
    if let Some(warning) = warning {
        tracing::warn!("{}", warning);
    }
}
