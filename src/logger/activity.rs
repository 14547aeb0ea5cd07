//! Activity logger thread and the handle other threads log through.
//!
//! A dedicated thread owns the [`JsonlWriter`]. Everyone else sends
//! [`ActivityEvent`]s over a bounded crossbeam channel with `try_send`, so a
//! slow disk never stalls the board loop or the feed client; overflow is
//! counted and reported as a warning line once there is room again.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};

use crate::core::errors::{Result, SfbError};
use crate::logger::jsonl::{EventType, JsonlOptions, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 1024;
const RECOVER_INTERVAL: Duration = Duration::from_secs(60);

/// Something worth a line in the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    DaemonStarted {
        version: String,
        config_hash: String,
    },
    DaemonStopped {
        reason: String,
        uptime_secs: u64,
        writes: u64,
    },
    FeedConnected {
        url: String,
    },
    FeedDisconnected {
        reason: String,
        retry_in_ms: u64,
    },
    FeedMessageRejected {
        code: String,
        message: String,
    },
    SnapshotApplied {
        nodes: usize,
        unknown: usize,
        overflow: usize,
        full_refresh: bool,
    },
    RefreshCompleted {
        trigger: String,
        ok: usize,
        failed: Vec<String>,
        duration_ms: u64,
    },
    MetricFailed {
        metric: String,
        row: usize,
        details: String,
    },
    UnsupportedCharacters {
        metric: String,
        row: usize,
        replaced: String,
    },
    DisplayWritten {
        sink: String,
        trigger: String,
        message_id: Option<String>,
    },
    DisplayWriteFailed {
        sink: String,
        code: String,
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Stop the logger thread after flushing.
    Shutdown,
}

impl ActivityEvent {
    /// Generic error line carrying the error's code and message.
    #[must_use]
    pub fn from_error(err: &SfbError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Cloneable, non-blocking sender for activity events.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Handle whose events go nowhere.
    #[must_use]
    pub fn noop() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle plus the receiving end, for inspecting events directly.
    #[must_use]
    pub fn capture(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Queue an event. Drops it, and counts the drop, if the queue is full.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks until queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub jsonl: JsonlOptions,
    pub channel_capacity: usize,
}

impl LoggerOptions {
    #[must_use]
    pub fn at(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            jsonl: JsonlOptions::at(path),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

/// Start the logger thread.
pub fn spawn_logger(
    options: LoggerOptions,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded(options.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };
    let jsonl = options.jsonl;
    let join = thread::Builder::new()
        .name("sfb-logger".to_string())
        .spawn(move || logger_thread_main(&rx, jsonl, &dropped))
        .map_err(|err| SfbError::Runtime {
            details: format!("failed to spawn logger thread: {err}"),
        })?;
    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, options: JsonlOptions, dropped: &AtomicU64) {
    let mut writer = JsonlWriter::open(options);
    loop {
        let event = match rx.recv_timeout(RECOVER_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                writer.try_recover();
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{lost} activity events dropped under back-pressure"));
            writer.write_entry(&warn);
        }

        if event == ActivityEvent::Shutdown {
            break;
        }
        writer.write_entry(&to_log_entry(&event));
    }
    writer.sync();
}

/// Log line for an event.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DaemonStarted {
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStart, Severity::Info);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
            writes,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStop, Severity::Info);
            e.details = Some(format!(
                "reason={reason} uptime={uptime_secs}s display_writes={writes}"
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::FeedConnected { url } => {
            let mut e = LogEntry::new(EventType::FeedConnect, Severity::Info);
            e.details = Some(url.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::FeedDisconnected {
            reason,
            retry_in_ms,
        } => {
            let mut e = LogEntry::new(EventType::FeedDisconnect, Severity::Warning);
            e.details = Some(format!("{reason}; retry in {retry_in_ms}ms"));
            e.ok = Some(false);
            e
        }
        ActivityEvent::FeedMessageRejected { code, message } => {
            let mut e = LogEntry::new(EventType::FeedMessageRejected, Severity::Warning);
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::SnapshotApplied {
            nodes,
            unknown,
            overflow,
            full_refresh,
        } => {
            let mut e = LogEntry::new(EventType::SnapshotApplied, Severity::Info);
            e.trigger = Some("feed".to_string());
            e.row = Some(1);
            e.nodes = Some(*nodes);
            e.details = Some(format!(
                "unknown={unknown} overflow={overflow} full_refresh={full_refresh}"
            ));
            e
        }
        ActivityEvent::RefreshCompleted {
            trigger,
            ok,
            failed,
            duration_ms,
        } => {
            let severity = if failed.is_empty() {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut e = LogEntry::new(EventType::RefreshComplete, severity);
            e.trigger = Some(trigger.clone());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(failed.is_empty());
            e.details = Some(format!("ok={ok} failed=[{}]", failed.join(",")));
            e
        }
        ActivityEvent::MetricFailed {
            metric,
            row,
            details,
        } => {
            let mut e = LogEntry::new(EventType::MetricFailed, Severity::Warning);
            e.metric = Some(metric.clone());
            e.row = Some(*row);
            e.value = Some(crate::metrics::values::ERROR_SENTINEL.to_string());
            e.ok = Some(false);
            e.error_message = Some(details.clone());
            e
        }
        ActivityEvent::UnsupportedCharacters {
            metric,
            row,
            replaced,
        } => {
            let mut e = LogEntry::new(EventType::UnsupportedCharacters, Severity::Warning);
            e.metric = Some(metric.clone());
            e.row = Some(*row);
            e.error_code = Some("SFB-2001".to_string());
            e.details = Some(format!("rendered blank: {replaced:?}"));
            e
        }
        ActivityEvent::DisplayWritten {
            sink,
            trigger,
            message_id,
        } => {
            let mut e = LogEntry::new(EventType::DisplayWrite, Severity::Info);
            e.trigger = Some(trigger.clone());
            e.message_id.clone_from(message_id);
            e.ok = Some(true);
            e.details = Some(format!("sink={sink}"));
            e
        }
        ActivityEvent::DisplayWriteFailed {
            sink,
            code,
            message,
        } => {
            let mut e = LogEntry::new(EventType::DisplayWriteFailed, Severity::Critical);
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.details = Some(format!("sink={sink}"));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Warning);
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::DaemonStop, Severity::Info),
    }
}
