//! Board daemon: wires the orchestrator to its inputs and runs until shutdown.
//!
//! Threads:
//! - main (this loop): sole owner of the grid via [`Orchestrator`]
//! - `sfb-feed`: WebSocket client, sends snapshots
//! - `sfb-scheduler`: sleeps to each refresh slot, sends refresh commands
//! - `sfb-logger`: JSONL activity log
//!
//! Feed and scheduler only ever talk to the board through one bounded queue.

#![allow(missing_docs)]

use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::board::grid::Grid;
use crate::core::config::Config;
use crate::core::errors::{Result, SfbError};
use crate::daemon::orchestrator::{BoardCommand, Orchestrator, Trigger, UpdateOutcome, WriteStatus};
use crate::daemon::schedule::RefreshSchedule;
use crate::daemon::signals::SignalHandler;
use crate::display::DisplaySink;
use crate::display::preview::PreviewSink;
use crate::display::vestaboard::VestaboardSink;
use crate::feed::client::FeedClient;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, LoggerOptions, spawn_logger};
use crate::metrics::refresh::RefreshReport;
use crate::metrics::sources::HttpMetricSource;

/// Capacity of the board command queue.
const COMMAND_CHANNEL_CAP: usize = 64;
/// Upper bound on how long the loop waits before re-checking signals.
const TICK: Duration = Duration::from_millis(250);

/// Arguments for `sfb daemon`.
#[derive(Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Run one full refresh right after startup instead of waiting for the
    /// first feed message or schedule slot.
    pub refresh_on_start: bool,
    /// Print grids to stdout instead of writing to the display.
    pub dry_run: bool,
}

/// Pick the sink for a run: the display API, or a stdout preview.
pub fn build_sink(config: &Config, dry_run: bool) -> Result<Box<dyn DisplaySink>> {
    if dry_run {
        return Ok(Box::new(PreviewSink::stdout()));
    }
    config.validate_display_credentials()?;
    Ok(Box::new(VestaboardSink::new(&config.display, &config.http)?))
}

pub struct BoardDaemon {
    config: Config,
    args: DaemonArgs,
    orchestrator: Orchestrator,
    schedule: RefreshSchedule,
    signals: SignalHandler,
    logger_handle: ActivityLoggerHandle,
    logger_join: Option<thread::JoinHandle<()>>,
    start_time: Instant,
}

impl BoardDaemon {
    pub fn init(config: Config, args: DaemonArgs) -> Result<Self> {
        if args.dry_run {
            if config.feed.enabled && config.feed.url.trim().is_empty() {
                return Err(SfbError::InvalidConfig {
                    details: "feed.url is required when feed.enabled=true".to_string(),
                });
            }
        } else {
            config.validate_for_daemon()?;
        }
        let schedule = RefreshSchedule::from_config(&config.schedule)?;
        let (logger_handle, logger_join) =
            spawn_logger(LoggerOptions::at(config.paths.jsonl_log.clone()))?;
        let source = HttpMetricSource::new(&config.sources, &config.http)?;
        let sink = build_sink(&config, args.dry_run)?;
        let orchestrator =
            Orchestrator::new(&config.board, Box::new(source), sink, logger_handle.clone());

        Ok(Self {
            config,
            args,
            orchestrator,
            schedule,
            signals: SignalHandler::new(),
            logger_handle,
            logger_join: Some(logger_join),
            start_time: Instant::now(),
        })
    }

    /// Run until SIGTERM/SIGINT.
    pub fn run(&mut self) -> Result<()> {
        let config_hash = self.config.stable_hash().unwrap_or_default();
        eprintln!(
            "[SFB-DAEMON] starting v{} (config {config_hash})",
            env!("CARGO_PKG_VERSION")
        );
        self.logger_handle.send(ActivityEvent::DaemonStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash,
        });

        let (tx, rx) = bounded::<BoardCommand>(COMMAND_CHANNEL_CAP);
        let mut workers = Vec::new();
        if self.config.feed.enabled {
            let client = FeedClient::new(
                &self.config.feed,
                tx.clone(),
                self.signals.clone(),
                self.logger_handle.clone(),
            );
            workers.push(client.spawn()?);
        } else {
            eprintln!("[SFB-DAEMON] feed disabled; status row only changes on refresh");
        }
        if let Some(handle) =
            spawn_scheduler(self.schedule.clone(), tx.clone(), self.signals.clone())?
        {
            workers.push(handle);
        }
        drop(tx);

        if self.args.refresh_on_start {
            self.apply(BoardCommand::RefreshNow);
        }

        let reason = self.command_loop(&rx);
        self.shutdown(rx, workers, reason);
        Ok(())
    }

    fn command_loop(&mut self, rx: &Receiver<BoardCommand>) -> &'static str {
        loop {
            if self.signals.should_shutdown() {
                eprintln!("[SFB-DAEMON] shutdown requested");
                return "signal";
            }
            if self.signals.take_refresh_request() {
                eprintln!("[SFB-DAEMON] refresh requested (SIGUSR1)");
                self.apply(BoardCommand::RefreshNow);
            }
            match rx.recv_timeout(TICK) {
                Ok(command) => {
                    if !self.apply(command) {
                        return "shutdown command";
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // No feed and no schedule: only signals can still drive the board.
                    if !self.signals.sleep_unless_shutdown(TICK) {
                        return "signal";
                    }
                }
            }
        }
    }

    /// Apply one command. Returns `false` for shutdown.
    fn apply(&mut self, command: BoardCommand) -> bool {
        match self.orchestrator.handle(command) {
            None => false,
            Some(outcome) => {
                report_outcome(&outcome);
                true
            }
        }
    }

    fn shutdown(
        &mut self,
        rx: Receiver<BoardCommand>,
        workers: Vec<thread::JoinHandle<()>>,
        reason: &str,
    ) {
        let uptime_secs = self.start_time.elapsed().as_secs();

        // Dropping the receiver unblocks any worker stuck on a full queue.
        self.signals.request_shutdown();
        drop(rx);
        for worker in workers {
            let _ = worker.join();
        }

        self.logger_handle.send(ActivityEvent::DaemonStopped {
            reason: reason.to_string(),
            uptime_secs,
            writes: self.orchestrator.writes(),
        });
        self.logger_handle.shutdown();
        if let Some(join) = self.logger_join.take() {
            let _ = join.join();
        }
        eprintln!(
            "[SFB-DAEMON] shutdown complete (uptime={uptime_secs}s, writes={})",
            self.orchestrator.writes()
        );
    }
}

fn report_outcome(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::Duplicate => {}
        UpdateOutcome::StatusOnly { write, .. } => {
            if let WriteStatus::Failed { code } = write {
                eprintln!("[SFB-DAEMON] status push failed ({code})");
            }
        }
        UpdateOutcome::FullRefresh {
            trigger,
            report,
            write,
            ..
        } => {
            let failed = report.failed();
            if !failed.is_empty() {
                let names: Vec<&str> = failed.iter().map(|kind| kind.name()).collect();
                eprintln!(
                    "[SFB-DAEMON] {trigger} refresh: {} shown as error",
                    names.join(", ")
                );
            }
            if let WriteStatus::Failed { code } = write {
                eprintln!("[SFB-DAEMON] {trigger} refresh push failed ({code})");
            }
        }
    }
}

/// Start the thread that turns schedule slots into refresh commands.
/// `None` when the schedule is disabled.
pub fn spawn_scheduler(
    schedule: RefreshSchedule,
    commands: Sender<BoardCommand>,
    signals: SignalHandler,
) -> Result<Option<thread::JoinHandle<()>>> {
    if !schedule.is_enabled() {
        return Ok(None);
    }
    thread::Builder::new()
        .name("sfb-scheduler".to_string())
        .spawn(move || scheduler_thread_main(&schedule, &commands, &signals))
        .map(Some)
        .map_err(|err| SfbError::Runtime {
            details: format!("failed to spawn scheduler thread: {err}"),
        })
}

fn scheduler_thread_main(
    schedule: &RefreshSchedule,
    commands: &Sender<BoardCommand>,
    signals: &SignalHandler,
) {
    while let Some(slot) = schedule.next_after(Utc::now()) {
        let wait = (slot - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        if !signals.sleep_unless_shutdown(wait) {
            return;
        }
        if commands.send(BoardCommand::ScheduledRefresh { slot }).is_err() {
            return;
        }
    }
    eprintln!("[SFB-SCHEDULE] no upcoming refresh slots; scheduler exiting");
}

/// Result of a single `sfb refresh`.
#[derive(Debug, Clone)]
pub struct RunOnceReport {
    pub grid: Grid,
    pub report: RefreshReport,
    pub write: WriteStatus,
}

/// One full refresh and push to `sink` outside the daemon.
pub fn run_once(config: &Config, sink: Box<dyn DisplaySink>) -> Result<RunOnceReport> {
    let source = HttpMetricSource::new(&config.sources, &config.http)?;
    let (logger_handle, logger_join) =
        spawn_logger(LoggerOptions::at(config.paths.jsonl_log.clone()))?;
    let mut orchestrator =
        Orchestrator::new(&config.board, Box::new(source), sink, logger_handle.clone());

    let outcome = orchestrator.handle_refresh(Trigger::Manual);
    logger_handle.shutdown();
    let _ = logger_join.join();

    match outcome {
        UpdateOutcome::FullRefresh { report, write, .. } => Ok(RunOnceReport {
            grid: *orchestrator.grid(),
            report,
            write,
        }),
        other => Err(SfbError::Runtime {
            details: format!("unexpected refresh outcome: {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScheduleConfig;

    #[test]
    fn daemon_args_default_waits_for_inputs() {
        let args = DaemonArgs::default();
        assert!(!args.refresh_on_start);
        assert!(!args.dry_run);
    }

    #[test]
    fn real_sink_requires_credentials() {
        let err = build_sink(&Config::default(), false)
            .err()
            .expect("missing credentials");
        assert_eq!(err.code(), "SFB-1001");
        let preview = build_sink(&Config::default(), true).expect("dry-run sink");
        assert_eq!(preview.name(), "preview");
    }

    #[test]
    fn disabled_schedule_spawns_nothing() {
        let schedule = RefreshSchedule::from_config(&ScheduleConfig {
            enabled: false,
            ..ScheduleConfig::default()
        })
        .unwrap();
        let (tx, _rx) = bounded(1);
        let handle = spawn_scheduler(schedule, tx, SignalHandler::detached()).unwrap();
        assert!(handle.is_none());
    }

    #[test]
    fn scheduler_thread_stops_on_shutdown() {
        let schedule = RefreshSchedule::from_config(&ScheduleConfig::default()).unwrap();
        let (tx, rx) = bounded(1);
        let signals = SignalHandler::detached();
        let handle = spawn_scheduler(schedule, tx, signals.clone())
            .unwrap()
            .expect("enabled schedule");
        signals.request_shutdown();
        handle.join().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dry_run_init_needs_feed_url_when_feed_enabled() {
        let mut config = Config::default();
        config.paths.jsonl_log = std::env::temp_dir().join("sfb-init-test.jsonl");
        let args = DaemonArgs {
            dry_run: true,
            ..DaemonArgs::default()
        };
        let err = BoardDaemon::init(config, args).err().expect("missing feed url");
        assert_eq!(err.code(), "SFB-1001");
    }
}
