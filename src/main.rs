//! locpatch - localization patch engine
//!
//! Applies a versioned set of exact-text localization rules to an upstream
//! source tree before it is built, reports rules that drifted, verifies the
//! patched files, and records the provenance of every run.

use clap::Parser;

mod applier;
mod cli;
mod commands;
mod config;
mod error;
mod hash;
mod locator;
mod logging;
mod pipeline;
mod progress;
mod provenance;
mod report;
mod ruleset;
mod transaction;
mod tree;
mod verify;
mod workers;

use cli::{Cli, Commands};
use logging::Verbosity;

fn main() {
    let cli = Cli::parse();
    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet));

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Apply(args) => commands::apply::run(config, args, cli.quiet),
        Commands::Check(args) => commands::check::run(config, args, cli.quiet),
        Commands::Lint(args) => commands::lint::run(args, cli.quiet),
        Commands::Version => commands::version::run(),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
