//! Structured diagnostics for webhook handling.
//!
//! Every webhook, whatever happens to it, produces exactly one [`DiagnosticRecord`], written to the
//! [`DiagnosticSink`] the [`crate::WebhookApi`] was built with. The sink is chosen once at startup.
use std::{
    fmt::Display,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

pub const DIAGNOSTICS_TARGET: &str = "spr::diagnostics";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticOutcome {
    Confirmed,
    BufferedUnresolvedHint,
    BufferedNoHint,
    BufferedUnknownHint,
    /// A second successful charge for an order that is already paid.
    BufferedExtraCharge,
    NoMatchingOrder,
    Ignored,
    MalformedPayload,
    LookupFailure,
    UpstreamUnavailable,
}

impl DiagnosticOutcome {
    pub fn level(&self) -> Level {
        use DiagnosticOutcome::*;
        match self {
            Confirmed | BufferedUnresolvedHint | Ignored => Level::Info,
            BufferedNoHint | BufferedUnknownHint | BufferedExtraCharge | UpstreamUnavailable | MalformedPayload => {
                Level::Warn
            },
            NoMatchingOrder | LookupFailure => Level::Error,
        }
    }
}

impl Display for DiagnosticOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).ok().and_then(|v| v.as_str().map(String::from)).unwrap_or_default();
        f.write_str(&s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub timestamp: DateTime<Utc>,
    pub event_kind: String,
    pub transaction_ref: Option<String>,
    pub outcome: DiagnosticOutcome,
    pub detail: String,
}

impl DiagnosticRecord {
    pub fn new<K: Into<String>, D: Into<String>>(
        event_kind: K,
        transaction_ref: Option<&str>,
        outcome: DiagnosticOutcome,
        detail: D,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_kind: event_kind.into(),
            transaction_ref: transaction_ref.map(String::from),
            outcome,
            detail: detail.into(),
        }
    }
}

impl Display for DiagnosticRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ref={} {}: {}",
            self.timestamp.to_rfc3339(),
            self.event_kind,
            self.transaction_ref.as_deref().unwrap_or("-"),
            self.outcome,
            self.detail
        )
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, record: &DiagnosticRecord);
}

/// Writes records to the `log` facade under the `spr::diagnostics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, record: &DiagnosticRecord) {
        log!(target: DIAGNOSTICS_TARGET, record.outcome.level(), "📨️ {record}");
    }
}

/// Appends one JSON object per line to a file, and echoes each record to the log.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiagnosticSink for JsonLinesSink {
    fn record(&self, record: &DiagnosticRecord) {
        LogSink.record(record);
        let line = match serde_json::to_string(record) {
            Ok(s) => s,
            Err(e) => {
                error!(target: DIAGNOSTICS_TARGET, "📨️ Could not serialize diagnostic record. {e}");
                return;
            },
        };
        match self.file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{line}") {
                    error!(target: DIAGNOSTICS_TARGET, "📨️ Could not write to {}. {e}", self.path.display());
                }
            },
            Err(e) => error!(target: DIAGNOSTICS_TARGET, "📨️ Diagnostics file lock is poisoned. {e}"),
        }
    }
}

/// Keeps records in memory. Used in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<DiagnosticRecord>>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn outcomes(&self) -> Vec<DiagnosticOutcome> {
        self.records().into_iter().map(|r| r.outcome).collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, record: &DiagnosticRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Picks the diagnostics sink. Records go to a JSON lines file when `path` is given, and to the log otherwise. Falls
/// back to [`LogSink`] if the file cannot be opened.
pub fn create_sink(path: Option<&str>) -> Arc<dyn DiagnosticSink> {
    match path.map(str::trim).filter(|s| !s.is_empty()) {
        Some(path) => match JsonLinesSink::open(path) {
            Ok(sink) => {
                info!("🪛️ Writing webhook diagnostics to {}", sink.path().display());
                Arc::new(sink)
            },
            Err(e) => {
                warn!("🪛️ Could not open diagnostics file {path}. {e}. Diagnostics will only be logged.");
                Arc::new(LogSink)
            },
        },
        None => {
            debug!("🪛️ No diagnostics file configured. Diagnostics will only be logged.");
            Arc::new(LogSink)
        },
    }
}
