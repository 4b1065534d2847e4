mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use error::CliError;
use mofscreen_core::{config::Config, logging};
use std::path::PathBuf;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("[ERROR] {}", e).red());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if cli.verbose > 0 && std::env::var_os("RUST_LOG").is_none() {
        let level = if cli.verbose > 1 { "trace" } else { "debug" };
        std::env::set_var("RUST_LOG", level);
    }

    let config = Config::load(&cli.config)?;

    match &cli.command {
        Commands::Status(_) => logging::init_stderr_logger(),
        _ => {
            config.ensure_layout()?;
            logging::init_campaign_logger(&config.logs_dir(), &config.logging)?;
        }
    }

    // Job scripts embed this path and run from an arbitrary working
    // directory on the compute node.
    let config_path: PathBuf = fs_err::canonicalize(&cli.config)?;

    match cli.command {
        Commands::Run(args) => commands::run::handle_run(&config, &config_path, args.range()),
        Commands::Submit(args) => {
            commands::submit::handle_submit(&config, &config_path, args.range(), false)
        }
        Commands::Resubmit(args) => {
            commands::submit::handle_submit(&config, &config_path, args.range(), true)
        }
        Commands::Status(args) => commands::status::handle_status(&config, args.update),
        Commands::RunUnit(args) => commands::run_unit::handle_run_unit(&config, &args.unit),
    }
}
