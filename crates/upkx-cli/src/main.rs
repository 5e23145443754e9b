//! upkx - hardened `.unitypackage` extraction and malicious content
//! scanning.

mod cli;
mod commands;
mod error;
mod output;
mod progress;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);
    let show_progress = !cli.quiet && !cli.json;

    let (operation, result) = match &cli.command {
        cli::Commands::Extract(args) => (
            "extract",
            commands::extract::execute(args, &*formatter, show_progress),
        ),
        cli::Commands::Preview(args) => ("preview", commands::preview::execute(args, &*formatter)),
        cli::Commands::Scan(args) => ("scan", commands::scan::execute(args, &*formatter)),
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            ("completion", Ok(()))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            formatter.format_error(operation, &e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the level picked from flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}
