//! Console configuration commands

use std::path::Path;

use anyhow::{bail, Result};
use clap::Subcommand;

use crate::config::ConsoleConfig;
use crate::output::{print_success, print_warning};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn execute(cmd: ConfigCommands, config: &ConsoleConfig, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            if !path.exists() {
                print_warning(&format!("{} does not exist, showing defaults", path.display()));
            }
            print!("{}", toml::to_string_pretty(config)?);
        }

        ConfigCommands::Init { force } => {
            init(path, force)?;
            print_success(&format!("Configuration written to {}", path.display()));
        }
    }
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ConsoleConfig::default().save(path)
}
