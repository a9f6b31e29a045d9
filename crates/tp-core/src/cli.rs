//! Command line interface.

use crate::accumulator::JsonLinesAccumulator;
use crate::chunk::ChunkedContent;
use crate::exit_codes::ExitCode;
use crate::logging::LogFormat;
use crate::poller::Poller;
use crate::registry::{IndexOutcome, Registry};
use crate::validate::validate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tp_common::Dialect;
use tp_config::{load_watch_config, resolve_host_ip, resolve_settings, ConfigError, ResolvedSettings};
use tracing::info;

/// Watches CSV table snapshots, validates them, and emits them in chunks.
#[derive(Parser, Debug)]
#[command(name = "tableprov", version, about)]
pub struct Cli {
    /// Settings file (overrides TABLEPROV_SETTINGS and the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Human)]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the watched tables until stopped
    Run {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
        /// Seconds between cycles (overrides interval_secs)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Run a single poll cycle
    Once,
    /// Validate one table file offline
    Validate {
        /// CSV table file
        file: PathBuf,
        /// Metadata dialect (1 or 2)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
        dialect: u8,
    },
    /// Resolve settings and list what would be watched
    Check,
}

/// Execute the parsed command.
pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Commands::Validate { ref file, dialect } => Ok(validate_file(file, dialect)),
        Commands::Check => check(cli.settings.as_deref()),
        Commands::Once => poll(cli.settings.as_deref(), Some(1), None),
        Commands::Run { cycles, interval } => poll(cli.settings.as_deref(), cycles, interval),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            let code = ExitCode::for_error(&err);
            eprintln!("tableprov: {err}");
            code
        }
    }
}

#[derive(Serialize)]
struct ValidateOutput<'a> {
    file: &'a Path,
    dialect: Dialect,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<crate::validate::TableReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn validate_file(file: &Path, dialect: u8) -> ExitCode {
    let dialect = Dialect::try_from(dialect).unwrap_or_default();
    let raw = match fs::read(file).map(String::from_utf8) {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            eprintln!("tableprov: {} is not UTF-8: {e}", file.display());
            return ExitCode::IoError;
        }
        Err(e) => {
            eprintln!("tableprov: cannot read {}: {e}", file.display());
            return ExitCode::IoError;
        }
    };
    let content = ChunkedContent::build(&raw, usize::MAX);
    let (output, code) = match validate(content.content(), dialect, file) {
        Ok(report) => (
            ValidateOutput {
                file,
                dialect,
                valid: true,
                report: Some(report),
                kind: None,
                error: None,
            },
            ExitCode::Clean,
        ),
        Err(err) => (
            ValidateOutput {
                file,
                dialect,
                valid: false,
                report: None,
                kind: Some(err.kind()),
                error: Some(err.to_string()),
            },
            ExitCode::ValidationFailed,
        ),
    };
    match serde_json::to_string_pretty(&output) {
        Ok(text) => {
            println!("{text}");
            code
        }
        Err(e) => {
            eprintln!("tableprov: {e}");
            ExitCode::InternalError
        }
    }
}

fn load_settings(cli_path: Option<&Path>) -> tp_common::Result<ResolvedSettings> {
    let resolved = resolve_settings(cli_path)?;
    info!(
        source = ?resolved.source,
        path = ?resolved.path,
        "settings resolved"
    );
    Ok(resolved)
}

fn check(cli_path: Option<&Path>) -> tp_common::Result<ExitCode> {
    let resolved = load_settings(cli_path)?;
    let settings = &resolved.settings;
    let watch = load_watch_config(&settings.watch_config)?;
    let discovery = Registry::discover(&watch);

    let tables: Vec<_> = discovery
        .tables
        .iter()
        .map(|(key, spec)| {
            json!({
                "file": key,
                "table": spec.name,
                "index": spec.index_name,
                "dialect": spec.dialect,
                "pid_file": spec.pid_file,
            })
        })
        .collect();
    let indices: Vec<_> = discovery
        .indices
        .iter()
        .map(|(path, outcome)| match outcome {
            IndexOutcome::Read { name, tables, .. } => json!({
                "path": path,
                "name": name,
                "tables": tables,
            }),
            IndexOutcome::Failed { name, error } => json!({
                "path": path,
                "name": name,
                "error": error.to_string(),
            }),
        })
        .collect();

    let output = json!({
        "settings_source": resolved.source,
        "settings_path": resolved.path,
        "settings": settings,
        "host_ip": resolve_host_ip(settings.host_ip.as_deref()),
        "watch": watch,
        "indices": indices,
        "tables": tables,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::Clean)
}

fn poll(
    cli_path: Option<&Path>,
    cycles: Option<u64>,
    interval: Option<u64>,
) -> tp_common::Result<ExitCode> {
    let resolved = load_settings(cli_path)?;
    let settings = &resolved.settings;
    let host_ip = resolve_host_ip(settings.host_ip.as_deref()).ok_or(ConfigError::NoHostIp)?;

    let mut poller = Poller::new(settings, host_ip)?;
    if let Some(secs) = interval {
        poller = poller.with_interval(Duration::from_secs(secs));
    }
    let acc = JsonLinesAccumulator::stdout();
    poller.run(&acc, cycles);
    Ok(ExitCode::Clean)
}
