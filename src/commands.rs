use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cia")]
#[command(about = "Check it all: admit a folder only when every file passes analysis", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./cia.{toml,yaml,json} when present)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a folder and decide whether all of its files are admissible
    Check {
        /// Folder to scan (overrides the `folder` configuration key)
        folder: Option<PathBuf>,
    },
    /// Print configuration values
    PrintConfig,
    /// Show which of the given files the filter would submit for analysis
    TestFilter {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}
