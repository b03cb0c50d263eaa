//! Command line interface.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Suspense - in-memory suspense cache for async resolvers.
#[derive(Parser, Debug)]
#[command(name = "suspense")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = crate::types::config::CONFIG_FILE)]
    pub config: PathBuf,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes a default configuration file.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Prints the effective configuration.
    Config,

    /// Runs the suspend protocol against a simulated resolver.
    Demo(DemoArgs),

    /// Prints the version.
    Version,
}

/// Options of the `demo` command.
#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Key segment; repeat for multi-part keys.
    #[arg(short, long = "key", default_value = "u1")]
    pub key: Vec<String>,

    /// Simulated resolver latency in milliseconds.
    #[arg(short, long, default_value_t = 100)]
    pub delay_ms: u64,

    /// Make the resolver fail.
    #[arg(long)]
    pub fail: bool,

    /// Lifespan of the fulfilled entry in milliseconds.
    #[arg(short, long)]
    pub lifespan_ms: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}
