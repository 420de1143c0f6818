//! multifetch CLI - command-line interface
//!
//! Fetches one remote file across several local uplinks at once. Each uplink
//! gets a contiguous share of the file; interrupted jobs resume from what
//! was already staged on disk.

mod commands;
mod error;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use multifetch::logging::{init_logging, LoggingGuard};

use commands::assemble::AssembleArgs;
use commands::common::load_config;
use commands::fetch::FetchArgs;
use commands::probe::ProbeArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "multifetch", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.multifetch/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log debug detail (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download a file over every configured path
    Fetch(FetchArgs),

    /// Build the output file from completely staged chunks
    Assemble(AssembleArgs),

    /// Check each path and report the resource size
    Probe(ProbeArgs),

    /// Create or update the configuration file
    Init,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{} {} {}",
                style("error").red().bold(),
                style(format!("[{}]", e.stage())).dim(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Init = cli.command {
        return commands::init::run(cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let _logging = start_logging(
        &config.logging.level,
        config.logging.file.as_deref(),
        cli.verbose,
    )?;

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, &config),
        Commands::Assemble(args) => commands::assemble::run(args, &config),
        Commands::Probe(args) => commands::probe::run(args, &config),
        Commands::Init => Ok(()),
    }
}

fn start_logging(
    level: &str,
    file: Option<&std::path::Path>,
    verbose: u8,
) -> Result<LoggingGuard, CliError> {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    Ok(init_logging(level, file)?)
}
