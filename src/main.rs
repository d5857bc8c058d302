mod cli;
mod commands;
mod config;
mod github;
mod install_log;
mod menu;
mod nginx;
mod paths;
mod privilege;
mod progress;
mod prompt;
mod runner;
mod state;
mod ui;
mod validate;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Settings file given with `--config` or `VPSKIT_CONFIG`
    pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };
    log::debug!("verbosity {}", ctx.verbose);

    match cli.command {
        Command::Nginx(args) => commands::nginx::run(&ctx, args),
        Command::Github => commands::github::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "vpskit", &mut io::stdout());
            Ok(())
        }
    }
}
