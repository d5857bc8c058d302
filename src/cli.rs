use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vpskit")]
#[command(version)]
#[command(about = "Interactive bootstrap for nginx web hosts and GitHub credentials", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/vpskit/config.toml)
    #[arg(long, global = true, env = "VPSKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install, harden and manage nginx (requires root)
    Nginx(NginxArgs),

    /// Configure git identity and GitHub access tokens
    Github,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Default)]
pub struct NginxArgs {
    /// Show changes without writing files or running mutating commands
    #[arg(long)]
    pub dry_run: bool,
}
