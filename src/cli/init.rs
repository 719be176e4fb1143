//! Manifest initialization command

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::MANIFEST_FILE;

/// Write a sample manifest
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project name / directory
    #[arg(default_value = ".")]
    pub name: String,

    /// Overwrite an existing manifest
    #[arg(short, long)]
    pub force: bool,
}

impl InitCommand {
    pub fn execute(&self) -> Result<()> {
        let project_dir = Path::new(&self.name);

        eprintln!("{} Initializing new manifest...\n", "→".blue());

        // Create project directory if needed
        if self.name != "." {
            fs::create_dir_all(project_dir).context("Failed to create project directory")?;
        }

        let manifest_path = project_dir.join(MANIFEST_FILE);
        if manifest_path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists; pass --force to overwrite it",
                manifest_path.display()
            );
        }

        fs::write(&manifest_path, self.generate_manifest())
            .with_context(|| format!("Failed to write {}", MANIFEST_FILE))?;
        eprintln!("  {} Created {}", "✓".green(), MANIFEST_FILE.cyan());

        eprintln!("\n{} Manifest initialized successfully!\n", "✓".green().bold());

        eprintln!("  Next steps:");
        if self.name != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.name.cyan());
        }
        eprintln!("    {} chunkgraph build", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn project_name(&self) -> &str {
        if self.name == "." {
            "my-app"
        } else {
            &self.name
        }
    }

    fn generate_manifest(&self) -> String {
        format!(
            r#"# Chunkgraph manifest
#
# Modules and their dependencies as produced by the module builder.
# Blocks with a chunk_name are loaded on demand.

[project]
name = "{name}"
version = "0.1.0"

[entrypoints.main]
import = ["./src/main.js"]

[entrypoints.admin]
import = ["./src/admin.js"]
depend_on = ["main"]

[[modules]]
id = "./src/main.js"
size = 4200

[[modules.dependencies]]
target = "./src/shared.js"

[[modules.blocks]]
chunk_name = "settings"
options = {{ prefetchOrder = 1 }}

[[modules.blocks.dependencies]]
target = "./src/settings.js"

[[modules]]
id = "./src/shared.js"
size = 1800

[[modules]]
id = "./src/settings.js"
size = 2600

[[modules.dependencies]]
target = "./src/shared.js"

[[modules]]
id = "./src/admin.js"
size = 3100

[[modules.dependencies]]
target = "./src/shared.js"

[[modules]]
id = "runtime/load-script"
size = 400
runtime = true
stage = 10

[optimization]
chunk_overhead = 10000
entry_chunk_multiplicator = 10

[output]
hash_digest_length = 20
filename = "[name].[hash].js"
"#,
            name = self.project_name(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_generated_manifest_is_valid() {
        let cmd = InitCommand {
            name: "shop".to_string(),
            force: false,
        };
        let config = Config::parse(&cmd.generate_manifest()).unwrap();
        assert_eq!(config.project.name, "shop");
        assert_eq!(config.entrypoints.len(), 2);
        assert_eq!(config.modules.len(), 5);
    }
}
