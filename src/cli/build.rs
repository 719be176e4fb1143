//! Build command implementation

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::bundler::{Bundler, SealOptions, SealResult};
use crate::config::Config;
use crate::utils::format_size;

/// Seal the manifest's module graph into chunks
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Merge chunks until at most this many remain
    #[arg(long)]
    pub max_chunks: Option<usize>,
}

impl BuildCommand {
    pub fn execute(&self, config_path: &str) -> Result<()> {
        let start = Instant::now();

        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path)?;
        let project = config.project.name.clone();

        eprintln!("{} Building {}...", "→".blue(), project.cyan());

        let bundler = Bundler::new(config, self.into());
        let compilation = bundler.build()?;
        let result = compilation.summary(&project);

        if self.json {
            let json = serde_json::to_string_pretty(&result).context("Failed to serialize build result")?;
            println!("{}", json);
            return Ok(());
        }

        print_summary(&result, start.elapsed().as_secs_f64());
        Ok(())
    }
}

fn print_summary(result: &SealResult, seconds: f64) {
    eprintln!(
        "\n{} Sealed {} module(s) into {} chunk(s) in {:.2}s\n",
        "✓".green().bold(),
        result.modules,
        result.chunks.len(),
        seconds
    );

    for chunk in &result.chunks {
        let file = chunk.files.first().cloned().unwrap_or_else(|| chunk.id.clone());
        let mut flags = Vec::new();
        if chunk.entry {
            flags.push("runtime");
        }
        if chunk.initial {
            flags.push("initial");
        }
        eprintln!(
            "  {} {} {} {}",
            "•".dimmed(),
            file.cyan(),
            format_size(chunk.size).dimmed(),
            flags.join(", ").dimmed()
        );
        for module in &chunk.modules {
            eprintln!("      {}", module.dimmed());
        }
    }

    for entrypoint in &result.entrypoints {
        eprintln!(
            "\n  {} {} -> {}",
            "entry".bold(),
            entrypoint.name.cyan(),
            entrypoint.chunks.join(", ")
        );
    }

    for warning in &result.warnings {
        eprintln!("\n  {} {}", "⚠".yellow(), warning.yellow());
    }

    eprintln!("\n  {} {}\n", "hash".bold(), result.full_hash.dimmed());
}

impl From<&BuildCommand> for SealOptions {
    fn from(cmd: &BuildCommand) -> Self {
        Self {
            max_chunks: cmd.max_chunks,
        }
    }
}
