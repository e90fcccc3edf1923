//! Logging setup shared by the CelesTrak binaries.
//!
//! Libraries only emit `tracing` events; binaries call [`init`] once with a
//! [`LogConfig`], usually built by [`LogConfig::from_env`] and then adjusted
//! from command-line flags.

use std::env;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, format::FmtSpan, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub use tracing::{debug, error, info, trace, warn};

/// Environment variable names.
pub mod vars {
    pub const CELESTRAK_LOG_LEVEL: &str = "CELESTRAK_LOG_LEVEL";
    pub const CELESTRAK_LOG_FORMAT: &str = "CELESTRAK_LOG_FORMAT";
    pub const CELESTRAK_LOG_FILE: &str = "CELESTRAK_LOG_FILE";
    pub const CELESTRAK_LOG_SOURCE: &str = "CELESTRAK_LOG_SOURCE";
    pub const CELESTRAK_LOG_SPANS: &str = "CELESTRAK_LOG_SPANS";
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to initialize logging: {0}")]
    InitError(String),

    #[error("failed to open log file: {0}")]
    FileError(#[from] io::Error),

    #[error("unknown log format: {0}")]
    UnknownFormat(String),
}

/// Minimum level of emitted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Shift the level by `steps`: positive is more verbose, negative quieter.
    /// Saturates at `Error` and `Trace`.
    pub fn shifted(self, steps: i8) -> Self {
        const ORDER: [LogLevel; 5] = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ];
        let index = (self as i16 + i16::from(steps)).clamp(0, 4);
        ORDER[index as usize]
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable.
    #[default]
    Pretty,
    /// Single line per event.
    Compact,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(LogError::UnknownFormat(other.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Also append events to this file (never colored).
    pub file_path: Option<PathBuf>,
    /// Include file and line of the call site.
    pub source_location: bool,
    /// Emit span open/close events.
    pub span_events: bool,
    /// Per-target directives such as `celestrak_client=trace`, applied on
    /// top of `level`.
    pub directives: Vec<String>,
}

impl LogConfig {
    /// Defaults overlaid with the `CELESTRAK_LOG_*` variables.
    ///
    /// `RUST_LOG` is split into a bare level, used only when
    /// `CELESTRAK_LOG_LEVEL` is unset, and per-target directives, kept in
    /// [`LogConfig::directives`]. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let rust_log = env::var(vars::RUST_LOG).unwrap_or_default();

        let mut rust_log_level = None;
        for directive in rust_log.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match LogLevel::parse(directive) {
                Some(level) => rust_log_level = Some(level),
                None => config.directives.push(directive.to_string()),
            }
        }

        let level = match env::var(vars::CELESTRAK_LOG_LEVEL) {
            Ok(level) => LogLevel::parse(&level),
            Err(_) => rust_log_level,
        };
        if let Some(level) = level {
            config.level = level;
        }

        if let Ok(format) = env::var(vars::CELESTRAK_LOG_FORMAT) {
            config.format = format.parse().unwrap_or_default();
        }

        if let Ok(path) = env::var(vars::CELESTRAK_LOG_FILE) {
            if !path.trim().is_empty() {
                config.file_path = Some(PathBuf::from(path));
            }
        }

        config.source_location = flag(vars::CELESTRAK_LOG_SOURCE);
        config.span_events = flag(vars::CELESTRAK_LOG_SPANS);

        config
    }

    /// Adjust the level for `-v`/`-q` style flags.
    pub fn with_verbosity(mut self, verbose: u8, quiet: u8) -> Self {
        let steps = i16::from(verbose) - i16::from(quiet);
        self.level = self
            .level
            .shifted(steps.clamp(i16::from(i8::MIN), i16::from(i8::MAX)) as i8);
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// The filter used by [`init`]: `level` for every target, refined by
    /// `directives`. Invalid directives are skipped.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .parse_lossy(self.directives.join(","))
            .add_directive(LevelFilter::from(self.level).into())
    }
}

fn flag(var: &str) -> bool {
    env::var(var)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(config.span_events());

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Install the global subscriber. Events go to stderr, and to
/// `file_path` as well when set. Fails if a subscriber is already installed.
pub fn init(config: LogConfig) -> Result<(), LogError> {
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(&config, io::stderr, true)];

    if let Some(path) = &config.file_path {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        layers.push(fmt_layer(&config, Mutex::new(file), false));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(config.filter())
        .try_init()
        .map_err(|e| LogError::InitError(e.to_string()))
}
