//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use leetcode_auth::config::STRATEGY_SELECTORS;

/// Inspect LeetCode credential configuration.
///
/// Resolves the configured credential strategy, acquires tokens the same way
/// a client would, and reports what would be attached to requests.
#[derive(Parser, Debug)]
#[command(name = "leetcode-auth")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to read instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire credentials and report which ones would be attached
    Check(CheckArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    /// Override the configured strategy
    #[arg(long, value_parser = STRATEGY_SELECTORS)]
    pub from: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
