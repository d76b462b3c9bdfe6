mod child;
mod config;
mod monitor;
mod report;
mod signals;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::OverseerConfig;
use crate::monitor::MonitorParams;

/// Runs a single command under file-size and address-space limits, with
/// its standard streams redirected to files, and reports how it
/// terminated: exit status, fatal signal, and wall-clock time.
#[derive(Parser, Debug)]
#[command(name = "overseer", version, about)]
struct Cli {
    /// File bound to the command's standard input (default: inherited)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// File receiving the command's standard output (default: monitored.out)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// File receiving the command's standard error (default: monitored.err)
    #[arg(short, long, value_name = "FILE")]
    error: Option<PathBuf>,

    /// Largest file the command may write, in bytes (0 = unlimited)
    #[arg(short, long, value_name = "BYTES")]
    file_size_limit: Option<u64>,

    /// Address-space ceiling for the command, in bytes (0 = unlimited)
    #[arg(short, long, value_name = "BYTES")]
    memory_limit: Option<u64>,

    /// The command to run, whitespace-separated (no shell quoting)
    #[arg(short, long, value_name = "COMMAND")]
    command: Option<String>,

    /// Config file path
    #[arg(long, default_value = "overseer.toml", value_name = "PATH")]
    config: PathBuf,

    /// Print the outcome as JSON instead of key=value lines
    #[arg(long)]
    json: bool,

    /// Extra logging (spawn and wait-loop details)
    #[arg(short, long)]
    verbose: bool,
}

/// Merge CLI flags over config-file values over built-in defaults.
fn resolve_params(cli: &Cli, cfg: OverseerConfig) -> Result<MonitorParams, String> {
    let command = cli
        .command
        .clone()
        .or(cfg.command)
        .ok_or("no command given; use -c/--command or set `command` in the config file")?;

    Ok(MonitorParams {
        input: cli.input.clone().or(cfg.io.input),
        output: cli.output.clone().unwrap_or(cfg.io.output),
        error: cli.error.clone().unwrap_or(cfg.io.error),
        file_size_limit: cli.file_size_limit.unwrap_or(cfg.limits.file_size),
        memory_limit: cli.memory_limit.unwrap_or(cfg.limits.memory),
        command,
    })
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load(&cli.config);
    let params = match resolve_params(&cli, cfg) {
        Ok(params) => params,
        Err(msg) => {
            eprintln!("overseer: error: {msg}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?params, "resolved parameters");

    let outcome = match monitor::run(&params) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("overseer: error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let rendered = if cli.json {
        match report::render_json(&outcome) {
            Ok(rendered) => rendered,
            Err(err) => {
                eprintln!("overseer: error: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        report::render_text(&outcome)
    };
    print!("{rendered}");
    ExitCode::SUCCESS
}
