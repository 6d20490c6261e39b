//! Host log forwarding
//!
//! The core logs through `tracing`. Hosts that want those records in their
//! own pipeline (a webview console, a desktop log file) implement
//! [`LoggerSink`] and hand it to the core's logging setup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One log record as delivered to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code, e.g. `core_session::store`.
    pub target: String,
    pub message: String,
    /// Structured fields, already redacted by the core.
    pub fields: HashMap<String, String>,
    /// Name of the innermost span the record was emitted in.
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }
}

/// Receives log records forwarded from the core.
///
/// Records below [`min_level`](LoggerSink::min_level) are filtered before
/// they are built, so a quiet sink costs almost nothing. Implementations must
/// not block: delivery happens on the async runtime.
///
/// ```
/// use async_trait::async_trait;
/// use bridge_traits::error::Result;
/// use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
///
/// struct ErrorsOnly;
///
/// #[async_trait]
/// impl LoggerSink for ErrorsOnly {
///     async fn log(&self, entry: LogEntry) -> Result<()> {
///         eprintln!("{}: {}", entry.target, entry.message);
///         Ok(())
///     }
///
///     fn min_level(&self) -> LogLevel {
///         LogLevel::Error
///     }
/// }
/// ```
#[async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Prints records to stdout. Handy during development.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level < self.min_level {
            return Ok(());
        }

        println!(
            "[{}] {} {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.level.as_str(),
            entry.target,
            entry.message
        );
        if !entry.fields.is_empty() {
            println!("  {:?}", entry.fields);
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
