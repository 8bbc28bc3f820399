//! Logging and tracing infrastructure
//!
//! Two layers live here. [`init_tracing`] wires up the global `tracing`
//! subscriber (JSON or pretty format, level from the environment). The
//! [`ValidationLog`] is an append-only, thread-safe buffer of the notable
//! lines a validation run emits: audit lines, resolution results, redirect
//! hops. Every entry is also forwarded to `tracing`, so the buffer costs
//! nothing operationally but gives callers (and tests) a way to inspect
//! exactly what a run logged.

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Prefix carried by every audit entry.
pub const AUDIT_PREFIX: &str = "[AUDIT]";

/// Initialize the global tracing subscriber
///
/// Uses JSON output when `PERIMETER_LOG_FORMAT=json` (the default) and a
/// human-readable format for `pretty`. The filter comes from `RUST_LOG`,
/// falling back to `info`.
pub fn init_tracing() -> Result<()> {
    let format = std::env::var("PERIMETER_LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let json_layer = if format == "json" {
        Some(fmt::layer().json().with_target(true))
    } else {
        None
    };
    let pretty_layer = if format == "pretty" {
        Some(fmt::layer().pretty().with_target(true))
    } else {
        None
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()?;

    Ok(())
}

/// Severity of a [`ValidationLog`] entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    /// Audit-relevant events that must survive into operator review.
    Notice,
    /// Routine progress lines (resolution results, redirects).
    Info,
    /// Diagnostic detail.
    Debug,
}

/// One line recorded by a validation run
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: LogSeverity,
    pub message: String,
}

/// Append-only, thread-safe log buffer for validation runs
///
/// Validations run on detached tasks, so several may write concurrently;
/// the buffer serializes appends and hands out snapshots on read.
#[derive(Debug, Default)]
pub struct ValidationLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl ValidationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an audit line at notice severity
    ///
    /// The message is stored (and emitted) with the `[AUDIT]` prefix.
    pub fn audit(&self, message: impl Into<String>) {
        let message = format!("{} {}", AUDIT_PREFIX, message.into());
        info!("{}", message);
        self.push(LogSeverity::Notice, message);
    }

    /// Record a routine progress line
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.push(LogSeverity::Info, message);
    }

    /// Record a diagnostic line
    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("{}", message);
        self.push(LogSeverity::Debug, message);
    }

    fn push(&self, severity: LogSeverity, message: String) {
        self.entries.lock().push(LogEntry {
            timestamp: Utc::now(),
            severity,
            message,
        });
    }

    /// Snapshot of every recorded entry, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Messages containing the given needle, oldest first
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.message.contains(needle))
            .map(|e| e.message.clone())
            .collect()
    }

    /// Audit entries (notice severity, `[AUDIT]` prefix) only
    pub fn audit_entries(&self) -> Vec<String> {
        self.matching(AUDIT_PREFIX)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop all recorded entries
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
