//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use thiserror::Error;

use splitflap_board::board::charset::DisplayText;
use splitflap_board::board::grid::{BoardRow, COLS, Grid};
use splitflap_board::board::render::{RenderPolicy, RowRenderer};
use splitflap_board::core::config::Config;
use splitflap_board::core::errors::SfbError;
use splitflap_board::daemon::loop_main::{self, BoardDaemon};
use splitflap_board::daemon::orchestrator::WriteStatus;
use splitflap_board::daemon::schedule::RefreshSchedule;
use splitflap_board::display::DisplaySink;
use splitflap_board::display::memory::RecordingSink;

/// Split-flap board daemon: live network metrics and node status on a Vestaboard.
#[derive(Debug, Parser)]
#[command(
    name = "sfb",
    author,
    version,
    about = "Split-flap board updater",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the board daemon until SIGTERM/SIGINT.
    Daemon(DaemonArgs),
    /// Fetch every metric once and push the board.
    Refresh(RefreshArgs),
    /// Show the flap codes for a piece of text and where it lands on a row.
    Encode(EncodeArgs),
    /// Inspect configuration.
    Config(ConfigArgs),
    /// Inspect the full-refresh schedule.
    Schedule(ScheduleArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct DaemonArgs {
    /// Run one full refresh right after startup.
    #[arg(long)]
    refresh_on_start: bool,
    /// Print grids instead of writing to the display.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct RefreshArgs {
    /// Print the grid instead of writing to the display.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Args)]
struct EncodeArgs {
    /// Text to encode.
    text: String,
    /// Row index (0-5) to render the text into.
    #[arg(long, value_name = "N")]
    row: Option<usize>,
    /// Blank the row's value field before rendering.
    #[arg(long)]
    clear: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective config with secrets redacted.
    Show,
    /// Load and validate the config.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct ScheduleArgs {
    #[command(subcommand)]
    command: ScheduleCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum ScheduleCommand {
    /// List upcoming refresh slots.
    Next {
        /// How many slots to list.
        #[arg(long, default_value_t = 5, value_name = "N")]
        count: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Operation partially succeeded.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<SfbError> for CliError {
    fn from(err: SfbError) -> Self {
        match err {
            SfbError::InvalidConfig { .. }
            | SfbError::MissingConfig { .. }
            | SfbError::ConfigParse { .. }
            | SfbError::UnsupportedCharacter { .. }
            | SfbError::ValueTooLong { .. } => Self::User(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Daemon(args) => run_daemon(cli, args),
        Command::Refresh(args) => run_refresh(cli, args),
        Command::Encode(args) => run_encode(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Schedule(args) => run_schedule(cli, args),
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn run_daemon(cli: &Cli, args: &DaemonArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let daemon_args = loop_main::DaemonArgs {
        refresh_on_start: args.refresh_on_start,
        dry_run: args.dry_run,
    };
    let mut daemon = BoardDaemon::init(config, daemon_args)?;
    daemon.run()?;
    Ok(())
}

fn run_refresh(cli: &Cli, args: &RefreshArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let mode = output_mode(cli);
    // JSON carries the grid itself; the preview would corrupt the document.
    let sink: Box<dyn DisplaySink> = if args.dry_run && mode == OutputMode::Json {
        Box::new(RecordingSink::new())
    } else {
        loop_main::build_sink(&config, args.dry_run)?
    };
    let result = loop_main::run_once(&config, sink)?;
    let summary = result.report.summary();
    let failed: Vec<&str> = summary.failed.iter().map(|kind| kind.name()).collect();

    match mode {
        OutputMode::Human => {
            // A dry run has already printed the grid through the preview sink.
            if !args.dry_run {
                print!("{}", result.grid.preview());
            }
            for outcome in &result.report.outcomes {
                println!("  {:<16} {}", outcome.kind.name(), outcome.rendered());
            }
            match &result.write {
                WriteStatus::Written(receipt) => match &receipt.message_id {
                    Some(id) => println!("Board written (message {id})."),
                    None => println!("Board written."),
                },
                WriteStatus::Failed { code } => println!("Board write failed ({code})."),
            }
        }
        OutputMode::Json => {
            let metrics: Vec<Value> = result
                .report
                .outcomes
                .iter()
                .map(|outcome| {
                    json!({
                        "metric": outcome.kind.name(),
                        "value": outcome.rendered(),
                        "failed": outcome.value.is_failed(),
                    })
                })
                .collect();
            let payload = json!({
                "command": "refresh",
                "dry_run": args.dry_run,
                "metrics": metrics,
                "failed": failed,
                "written": result.write.is_written(),
                "grid": result.grid,
            });
            write_json_line(&payload)?;
        }
    }

    if let WriteStatus::Failed { code } = result.write {
        return Err(CliError::Runtime(format!("[{code}] board write failed")));
    }
    if !failed.is_empty() {
        return Err(CliError::Partial(format!(
            "board written with errors: {}",
            failed.join(", ")
        )));
    }
    Ok(())
}

fn run_encode(cli: &Cli, args: &EncodeArgs) -> Result<(), CliError> {
    let text = DisplayText::parse(&args.text)?;
    if text.len() > COLS {
        return Err(CliError::User(format!(
            "text is {} characters; a row holds {COLS}",
            text.len()
        )));
    }
    let row = match args.row {
        None => None,
        Some(index) => Some(BoardRow::from_index(index).ok_or_else(|| {
            CliError::User(format!("row must be between 0 and 5, got {index}"))
        })?),
    };

    let grid = match row {
        None => None,
        Some(row) => {
            let renderer = RowRenderer::new(RenderPolicy::from_clear_flag(args.clear));
            let mut grid = Grid::with_labels();
            renderer.render(&mut grid, row, &text)?;
            Some(grid)
        }
    };

    match output_mode(cli) {
        OutputMode::Human => {
            let codes: Vec<String> = text.codes().iter().map(u8::to_string).collect();
            println!("{}", codes.join(" "));
            if let Some(grid) = &grid {
                print!("{}", grid.preview());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "encode",
                "text": text.as_str(),
                "codes": text.codes(),
                "row": row,
                "grid": grid,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?.redacted();

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => {
            let config = load_config(cli)?;
            let hash = config.stable_hash()?;
            let daemon_ready = config.validate_for_daemon();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("Configuration is valid.");
                    println!("  Source: {}", config.paths.config_file.display());
                    println!("  Hash: {hash}");
                    if let Err(err) = &daemon_ready {
                        println!("  Daemon: not ready ({err})");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config validate",
                        "valid": true,
                        "path": config.paths.config_file.to_string_lossy(),
                        "hash": hash,
                        "daemon_ready": daemon_ready.is_ok(),
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
    }
}

fn run_schedule(cli: &Cli, args: &ScheduleArgs) -> Result<(), CliError> {
    let ScheduleCommand::Next { count } = args.command;
    let config = load_config(cli)?;
    let schedule = RefreshSchedule::from_config(&config.schedule)?;
    let slots: Vec<String> = schedule
        .upcoming(Utc::now(), count)
        .into_iter()
        .map(|slot| schedule.local(slot).to_rfc3339_opts(SecondsFormat::Secs, false))
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            if !schedule.is_enabled() {
                println!("Scheduled refresh is disabled.");
            }
            for slot in &slots {
                println!("{slot}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "schedule next",
                "enabled": schedule.is_enabled(),
                "slots": slots,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("SFB_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match env_mode.map(str::trim) {
        Some(mode) if mode.eq_ignore_ascii_case("json") => OutputMode::Json,
        _ => OutputMode::Human,
    }
}
