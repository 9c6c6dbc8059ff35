//! Command-Line Interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tracecheck - API-usage contract verification over captured call traces
#[derive(Parser, Debug)]
#[command(name = "tracecheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a trace against a contract file
    Check {
        /// Trace file to analyze
        #[arg(short, long)]
        trace: PathBuf,

        /// Contract file (annotation comments or bare contract blocks)
        #[arg(short = 'C', long)]
        contracts: PathBuf,

        /// Output format override ("text" or "json")
        #[arg(short, long)]
        format: Option<String>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Per-path event budget override
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// Parse and compile a contract file without analyzing anything
    Validate {
        /// Contract file to validate
        contracts: PathBuf,
    },

    /// Show the compiled automata of one contract
    Inspect {
        /// Contract file to load
        #[arg(short = 'C', long)]
        contracts: PathBuf,

        /// Contract (function) name to inspect
        function: String,

        /// Arity, when several contracts share the name
        #[arg(short, long)]
        arity: Option<usize>,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
