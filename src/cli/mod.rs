//! Command-line interface for Chunkgraph
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: Seal a manifest into chunks and print the result
//! - `init`: Scaffold a sample manifest

mod build;
mod init;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::BuildCommand;
pub use init::InitCommand;

/// Chunkgraph - the build-graph engine that turns a module graph into output chunks
#[derive(Parser, Debug)]
#[command(name = "chunkgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to chunkgraph.toml manifest
    #[arg(short, long, global = true, default_value = crate::config::MANIFEST_FILE)]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive, optimize and hash the chunks of a manifest
    Build(BuildCommand),

    /// Write a sample manifest
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Build(cmd) => cmd.execute(&self.config),
            Commands::Init(cmd) => cmd.execute(),
        }
    }
}

/// Print the Chunkgraph banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "Chunkgraph".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
