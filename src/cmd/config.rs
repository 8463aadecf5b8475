//! Configuration view and validation commands — `pcrflow config`.

use anyhow::{Result, bail};
use std::path::Path;

use pcrflow::config::{CONFIG_FILE_NAME, PipelineConfig};

use super::super::ConfigCommands;

pub fn cmd_config(config_path: Option<&Path>, command: Option<ConfigCommands>) -> Result<()> {
    let path = config_path.unwrap_or(Path::new(CONFIG_FILE_NAME));

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No {} found, using defaults.", path.display());
            }
            println!("Effective values (with env overrides):");
            println!();

            let config = PipelineConfig::resolve(path.exists().then_some(path))?;
            print!("{}", config.to_toml()?);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = PipelineConfig::resolve(path.exists().then_some(path))?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init { force }) => {
            if path.exists() && !force {
                bail!(
                    "{} already exists. Use --force to overwrite it.",
                    path.display()
                );
            }
            PipelineConfig::default().save(path)?;
            println!("Created {}", path.display());
        }
    }

    Ok(())
}
