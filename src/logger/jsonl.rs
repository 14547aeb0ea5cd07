//! Append-only JSONL activity log.
//!
//! One self-contained JSON object per line, written with a single `write_all`
//! so a concurrent `tail -f` never sees half a line. When the log file cannot
//! be written the writer steps down: primary path, then fallback path, then
//! stderr with a `[SFB-JSONL]` prefix, then silent discard. Logging never takes
//! the daemon down.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SfbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Kinds of activity the board daemon records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DaemonStart,
    DaemonStop,
    FeedConnect,
    FeedDisconnect,
    FeedMessageRejected,
    SnapshotApplied,
    RefreshComplete,
    MetricFailed,
    UnsupportedCharacters,
    DisplayWrite,
    DisplayWriteFailed,
    Error,
}

/// One log line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with milliseconds.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// What caused the update (`feed`, `schedule`, `manual`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    /// Rendered or rejected value text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Node count in a status snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// New entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: utc_now(),
            event,
            severity,
            trigger: None,
            row: None,
            metric: None,
            value: None,
            nodes: None,
            message_id: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Where lines currently go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

impl Destination {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonlOptions {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the current file would grow past this size.
    pub max_size_bytes: u64,
    /// Rotated generations kept as `<path>.1` … `<path>.N`.
    pub keep_rotated: u32,
}

impl JsonlOptions {
    /// Defaults around a primary path: fallback under the system temp dir,
    /// 10 MiB files, three rotated generations.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_path: Some(std::env::temp_dir().join("sfb-activity.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            keep_rotated: 3,
        }
    }
}

struct OpenLog {
    out: BufWriter<File>,
    size: u64,
}

pub struct JsonlWriter {
    opts: JsonlOptions,
    dest: Destination,
    file: Option<OpenLog>,
}

impl JsonlWriter {
    /// Open the primary log, stepping down the destination chain on failure.
    #[must_use]
    pub fn open(opts: JsonlOptions) -> Self {
        let mut writer = Self {
            opts,
            dest: Destination::Discard,
            file: None,
        };
        writer.reopen_from(Destination::Primary);
        writer
    }

    #[must_use]
    pub const fn destination(&self) -> Destination {
        self.dest
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(mut line) => {
                line.push('\n');
                self.write_line(&line);
            }
            Err(err) => {
                let _ = writeln!(io::stderr(), "[SFB-JSONL] serialize error: {err}");
            }
        }
    }

    /// Flush buffered lines and sync them to disk.
    pub fn sync(&mut self) {
        if let Some(log) = self.file.as_mut() {
            let _ = log.out.flush();
            let _ = log.out.get_ref().sync_data();
        }
    }

    /// Try to get back to the primary path after a step-down.
    pub fn try_recover(&mut self) {
        if self.dest == Destination::Primary {
            return;
        }
        if let Ok(log) = open_log(&self.opts.path) {
            self.file = Some(log);
            self.dest = Destination::Primary;
            let _ = writeln!(
                io::stderr(),
                "[SFB-JSONL] recovered to primary path: {}",
                self.opts.path.display()
            );
        }
    }

    fn current_path(&self) -> Option<&Path> {
        match self.dest {
            Destination::Primary => Some(&self.opts.path),
            Destination::Fallback => self.opts.fallback_path.as_deref(),
            Destination::Stderr | Destination::Discard => None,
        }
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        let needs_rotation = self
            .file
            .as_ref()
            .is_some_and(|log| log.size > 0 && log.size + len > self.opts.max_size_bytes);
        if needs_rotation {
            self.rotate();
        }

        loop {
            match self.dest {
                Destination::Primary | Destination::Fallback => {
                    let written = self.file.as_mut().is_some_and(|log| {
                        let ok = log.out.write_all(line.as_bytes()).is_ok()
                            && log.out.flush().is_ok();
                        if ok {
                            log.size += len;
                        }
                        ok
                    });
                    if written {
                        return;
                    }
                    self.step_down();
                }
                Destination::Stderr => {
                    if write!(io::stderr(), "[SFB-JSONL] {line}").is_err() {
                        self.dest = Destination::Discard;
                    }
                    return;
                }
                Destination::Discard => return,
            }
        }
    }

    fn step_down(&mut self) {
        let next = match self.dest {
            Destination::Primary => Destination::Fallback,
            Destination::Fallback => Destination::Stderr,
            Destination::Stderr | Destination::Discard => Destination::Discard,
        };
        let _ = writeln!(
            io::stderr(),
            "[SFB-JSONL] {} log unwritable, stepping down",
            self.dest.as_str()
        );
        self.reopen_from(next);
    }

    /// Open the first usable destination at or below `start`.
    fn reopen_from(&mut self, start: Destination) {
        self.file = None;
        if start == Destination::Primary {
            if let Ok(log) = open_log(&self.opts.path) {
                self.file = Some(log);
                self.dest = Destination::Primary;
                return;
            }
        }
        if matches!(start, Destination::Primary | Destination::Fallback) {
            if let Some(fallback) = self.opts.fallback_path.clone() {
                if let Ok(log) = open_log(&fallback) {
                    let _ = writeln!(
                        io::stderr(),
                        "[SFB-JSONL] using fallback log: {}",
                        fallback.display()
                    );
                    self.file = Some(log);
                    self.dest = Destination::Fallback;
                    return;
                }
            }
            self.dest = Destination::Stderr;
            return;
        }
        self.dest = start;
    }

    fn rotate(&mut self) {
        if let Some(mut log) = self.file.take() {
            let _ = log.out.flush();
        }
        let Some(base) = self.current_path().map(Path::to_path_buf) else {
            return;
        };
        shift_generations(&base, self.opts.keep_rotated);
        match open_log(&base) {
            Ok(log) => self.file = Some(log),
            Err(_) => self.step_down(),
        }
    }
}

// ──────────────────── helpers ────────────────────

fn open_log(path: &Path) -> Result<OpenLog> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| SfbError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SfbError::io(path, source))?;
    let size = file.metadata().map_or(0, |meta| meta.len());
    Ok(OpenLog {
        out: BufWriter::new(file),
        size,
    })
}

/// `base` → `base.1`, `base.1` → `base.2`, …; the oldest generation is removed.
fn shift_generations(base: &Path, keep: u32) {
    if keep == 0 {
        let _ = fs::remove_file(base);
        return;
    }
    let _ = fs::remove_file(generation(base, keep));
    for index in (1..keep).rev() {
        let _ = fs::rename(generation(base, index), generation(base, index + 1));
    }
    let _ = fs::rename(base, generation(base, 1));
}

fn generation(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
