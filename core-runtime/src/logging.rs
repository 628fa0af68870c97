//! # Logging
//!
//! Installs the process-wide `tracing` subscriber for a drive host.
//!
//! The subscriber is made of three parts:
//! - an `EnvFilter` built from [`LoggingConfig::level`] (our crates at that
//!   level, HTTP plumbing at `warn`) or from an explicit filter string
//! - one formatting layer on stdout, picked by [`LogFormat`]
//! - an optional forwarding layer that converts every event into a
//!   [`LogEntry`] for a host [`LoggerSink`]
//!
//! Field values headed for the sink go through [`redact_if_sensitive`] unless
//! redaction is switched off. Credentials never reach stdout either: call
//! sites log file names and storage paths, never passwords or tokens.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::from_env()?.with_logger_sink(journal))?;
//! tracing::info!(file = "report.pdf", "Upload complete");
//! ```
//!
//! Environment variables read by [`LoggingConfig::from_env`]:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `DRIVE_LOG` | full filter directive, overrides the level |
//! | `DRIVE_LOG_LEVEL` | `trace`, `debug`, `info`, `warn` or `error` |
//! | `DRIVE_LOG_FORMAT` | `pretty`, `json` or `compact` |

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{Error, Result};

/// Crates whose events follow [`LoggingConfig::level`].
const DRIVE_CRATES: &[&str] = &[
    "drive_workspace",
    "core_runtime",
    "core_auth",
    "core_sync",
    "core_service",
    "provider_firebase",
    "bridge_desktop",
];

/// Transport crates that are only interesting when they complain.
const QUIET_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls"];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored
    Pretty,
    /// One JSON object per line
    Json,
    /// Single line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::Config(format!("Unknown log format '{}'", other))),
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Mask credentials and email addresses in forwarded entries
    pub redact_pii: bool,
    /// Full `EnvFilter` directive, replaces the level-derived default
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Emit span enter/exit lines in the pretty format
    pub span_events: bool,
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_pii: true,
            filter: None,
            logger_sink: None,
            span_events: false,
            display_target: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("redact_pii", &self.redact_pii)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("span_events", &self.span_events)
            .field("display_target", &self.display_target)
            .finish()
    }
}

impl LoggingConfig {
    /// Defaults overridden by `DRIVE_LOG*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(format) = lookup("DRIVE_LOG_FORMAT") {
            config.format = format.parse::<LogFormat>()?;
        }
        if let Some(level) = lookup("DRIVE_LOG_LEVEL") {
            config.level = level
                .parse::<LogLevel>()
                .map_err(|e| Error::Config(format!("DRIVE_LOG_LEVEL: {}", e)))?;
        }
        config.filter = lookup("DRIVE_LOG").filter(|f| !f.trim().is_empty());
        Ok(config)
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_pii_redaction(mut self, redact: bool) -> Self {
        self.redact_pii = redact;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_span_events(mut self, enable: bool) -> Self {
        self.span_events = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    fn filter_directive(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        DRIVE_CRATES
            .iter()
            .map(|name| format!("{}={}", name, self.level))
            .chain(QUIET_CRATES.iter().map(|name| format!("{}=warn", name)))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(self.filter_directive())
            .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
    }
}

/// Install the global subscriber.
///
/// Fails when the filter does not parse or a global subscriber is already
/// installed; only the first call in a process can succeed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;

    let (pretty, json, compact) = match config.format {
        LogFormat::Pretty => {
            let spans = if config.span_events {
                FmtSpan::ACTIVE
            } else {
                FmtSpan::NONE
            };
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(config.display_target)
                .with_span_events(spans)
                .with_writer(io::stdout);
            (Some(layer), None, None)
        }
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_target(config.display_target)
                .with_writer(io::stdout);
            (None, Some(layer), None)
        }
        LogFormat::Compact => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(config.display_target)
                .with_writer(io::stdout);
            (None, None, Some(layer))
        }
    };

    let forward = config
        .logger_sink
        .clone()
        .map(|sink| SinkForwardLayer::new(sink, config.redact_pii));

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(compact)
        .with(forward)
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))
}

// ============================================================================
// Host forwarding
// ============================================================================

/// Converts events into [`LogEntry`] values for a [`LoggerSink`].
struct SinkForwardLayer {
    sink: Arc<dyn LoggerSink>,
    redact_pii: bool,
}

impl SinkForwardLayer {
    fn new(sink: Arc<dyn LoggerSink>, redact_pii: bool) -> Self {
        Self { sink, redact_pii }
    }

    fn entry(&self, level: LogLevel, event: &Event<'_>) -> LogEntry {
        let metadata = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (key, value) in fields.values {
            let value = if self.redact_pii {
                redact_if_sensitive(&key, &value)
            } else {
                value
            };
            entry.fields.insert(key, value);
        }
        entry
    }
}

impl<S> Layer<S> for SinkForwardLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = log_level(*event.metadata().level());
        if !self.sink.accepts(level) {
            return;
        }

        let mut entry = self.entry(level, event);
        entry.span = ctx.event_span(event).map(|span| span.name().to_string());
        deliver(Arc::clone(&self.sink), entry);
    }
}

/// Hand `entry` to the sink without blocking a runtime worker.
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(e) = sink.log(entry).await {
                    eprintln!("log sink rejected entry: {}", e);
                }
            });
        }
        Err(_) => {
            if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                eprintln!("log sink rejected entry: {}", e);
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: BTreeMap<String, String>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

fn log_level(level: tracing::Level) -> LogLevel {
    if level == tracing::Level::ERROR {
        LogLevel::Error
    } else if level == tracing::Level::WARN {
        LogLevel::Warn
    } else if level == tracing::Level::INFO {
        LogLevel::Info
    } else if level == tracing::Level::DEBUG {
        LogLevel::Debug
    } else {
        LogLevel::Trace
    }
}

// ============================================================================
// PII helpers
// ============================================================================

/// Field names whose values are never shown.
const SECRET_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "authorization",
    "bearer",
];

/// Mask `value` when the field carries a credential or the value is an
/// email address.
///
/// ```ignore
/// info!(email = %redact_if_sensitive("email", &email), "Signing in");
/// // email="a***@[REDACTED]"
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let field = field_name.to_ascii_lowercase();
    if SECRET_FIELDS.iter().any(|secret| field.contains(secret)) {
        return REDACTED.to_string();
    }
    mask_email(value).unwrap_or_else(|| value.to_string())
}

fn mask_email(value: &str) -> Option<String> {
    let (local, domain) = value.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || value.contains(char::is_whitespace) {
        return None;
    }
    let first = local.chars().next()?;
    Some(format!("{}***@{}", first, REDACTED))
}

/// Last component of a local or storage path.
///
/// `"/home/ada/report.pdf"` and `"users/u1/1700000000000_report.pdf"` log as
/// their file names.
pub fn strip_path(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or(path)
}
