pub mod board;
pub mod commands;
pub mod config;
pub mod errors;
pub mod field;
pub mod log_retention;
pub mod logging;
pub mod moves;
pub mod options;
pub mod partition;
pub mod readiness;
pub mod recording;
pub mod repl;
pub mod runtime;
pub mod session;
pub mod synthesize;

use board::render_plain;
use clap::{error::ErrorKind, CommandFactory, Parser};
use commands::{parse_key_value, parse_move_spec};
use config::{load_config, AppConfig, CliOverrides};
use errors::CredmapError;
use logging::{structured_fallback_line, JsonlLogger};
use partition::BucketId;
use runtime::ProductionRuntime;
use session::{Session, SessionSettings};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "credmap")]
#[command(about = "Map recorded form fields to credential roles and build a rotation payload")]
pub struct Cli {
    /// Recording JSON to load.
    #[arg(long)]
    pub recording: Option<PathBuf>,
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Move a field: <bucket>:<index>=<bucket>:<index>. Repeatable.
    #[arg(long = "move", value_name = "FROM=TO")]
    pub moves: Vec<String>,
    /// Append a field to a role: <role>=<unassigned index|digest prefix>. Repeatable.
    #[arg(long = "assign", value_name = "ROLE=FIELD")]
    pub assign: Vec<String>,
    /// Edit a password option: <name>=<value>. Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,
    /// Write the payload here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub show: bool,
    #[arg(long, default_value_t = false)]
    pub interactive: bool,
    #[arg(long)]
    pub log_path: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub no_log: bool,
    #[arg(long, default_value_t = false)]
    pub allow_unassigned: bool,
}

pub fn run() -> Result<i32, CredmapError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| CredmapError::Io(e.to_string()))?;
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &Path,
    runtime: &ProductionRuntime,
) -> Result<i32, CredmapError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(CredmapError::Cli(error.to_string())),
        },
    };

    if cli.recording.is_none() && !cli.interactive {
        return Err(CredmapError::Cli(
            "--recording is required unless --interactive is given".to_string(),
        ));
    }

    let overrides = CliOverrides {
        config_path: cli.config.as_ref().map(|path| absolutize(cwd, path)),
        log_path: cli.log_path.clone(),
        no_log: cli.no_log,
        allow_unassigned: cli.allow_unassigned,
    };
    let cfg = load_config(&overrides, cwd, runtime.file_system.as_ref())?;

    let mut session = Session::new(SessionSettings::from(&cfg));
    if cfg.logging.enabled {
        session = session.with_log(Box::new(event_logger(&cfg)));
    }

    let executor = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CredmapError::Io(e.to_string()))?;

    if let Some(path) = &cli.recording {
        let summary = executor.block_on(session.load_file(&absolutize(cwd, path)))?;
        report_status(
            runtime,
            "recording",
            "loaded",
            &format!("steps={} fields={}", summary.steps, summary.fields),
        )?;
    }
    apply_flags(&mut session, &cli)?;

    if cli.interactive {
        if cli.show && session.is_loaded() {
            repl::show(&session, runtime.terminal.as_ref())?;
        }
        repl::run_repl(&mut session, runtime.terminal.as_ref(), &executor, cwd)?;
        return Ok(0);
    }

    if cli.show {
        show_board(&session, runtime)?;
    }

    let payload = session.synthesize()?;
    let text = payload.to_pretty_json()?;
    match &cli.output {
        Some(path) => {
            let path = absolutize(cwd, path);
            if let Some(parent) = path.parent() {
                runtime.file_system.create_dir_all(parent)?;
            }
            runtime.file_system.write_string(&path, &text)?;
            report_status(
                runtime,
                "payload",
                "written",
                &format!("path={}", path.display()),
            )?;
        }
        None => runtime.terminal.write_line(&text)?,
    }
    Ok(0)
}

/// `--set`, then `--assign`, then `--move`, each in the order given.
fn apply_flags(session: &mut Session, cli: &Cli) -> Result<(), CredmapError> {
    for spec in &cli.set {
        let (name, value) = parse_key_value(spec)?;
        session.set_option(&name, &value)?;
    }
    for spec in &cli.assign {
        let (role, target) = parse_key_value(spec)?;
        let role = BucketId::parse(&role);
        match target.trim().parse::<usize>() {
            Ok(index) => {
                session.assign(role, index)?;
            }
            Err(_) => {
                let field = session.find_field(&target)?;
                session.move_to_end(&field, role)?;
            }
        }
    }
    for spec in &cli.moves {
        let (from, from_index, to, to_index) = parse_move_spec(spec)?;
        session.move_at(from, from_index, to, to_index)?;
    }
    Ok(())
}

/// Without a TTY the plain listing goes to stderr so stdout stays parseable.
fn show_board(session: &Session, runtime: &ProductionRuntime) -> Result<(), CredmapError> {
    if runtime.terminal.stdin_is_tty() {
        return repl::show(session, runtime.terminal.as_ref());
    }
    for line in render_plain(&session.buckets_view()?, &session.readiness()?) {
        eprintln!("{line}");
    }
    Ok(())
}

fn event_logger(cfg: &AppConfig) -> JsonlLogger {
    JsonlLogger {
        path: cfg.logging.path.clone(),
        max_payload_bytes: cfg.logging.max_payload_bytes,
        budget_bytes: cfg.logging.budget_bytes,
    }
}

/// Without a TTY the status goes to stderr as a structured line; stdout
/// carries only the payload.
fn report_status(
    runtime: &ProductionRuntime,
    scope: &str,
    state: &str,
    message: &str,
) -> Result<(), CredmapError> {
    if runtime.terminal.stdin_is_tty() {
        runtime
            .terminal
            .write_line(&format!("{scope} {state}: {message}"))
    } else {
        eprintln!("{}", structured_fallback_line(scope, state, message));
        Ok(())
    }
}

fn absolutize(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

pub fn render_help() -> String {
    Cli::command().render_long_help().to_string()
}
