//! Configuration CLI command.
//!
//! Shows the effective service configuration, prints the config file path, or
//! writes a default config file.

use std::path::{Path, PathBuf};

use locwatch::config::{config_file_path, ServiceConfig};

use crate::error::CliError;

/// Arguments for the config command.
pub struct ConfigArgs {
    pub config: Option<PathBuf>,
    pub init: bool,
    pub force: bool,
    pub path: bool,
}

/// Run the config command.
pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    let path = args.config.unwrap_or_else(config_file_path);

    if args.path {
        println!("{}", path.display());
        return Ok(());
    }
    if args.init {
        run_init(&path, args.force)?;
        println!("Wrote default configuration to {}", path.display());
        println!("Edit this file to tune accuracy thresholds and start retries.");
        return Ok(());
    }
    print!("{}", render_effective(&path)?);
    Ok(())
}

/// Effective configuration as INI, headed by where it came from.
fn render_effective(path: &Path) -> Result<String, CliError> {
    let config = ServiceConfig::load_from(path)?;
    let origin = if path.exists() {
        format!("; Loaded from {}\n", path.display())
    } else {
        format!("; {} not found, showing defaults\n", path.display())
    };
    Ok(format!("{}\n{}", origin, config.to_ini_string()))
}

/// Write a default config file. Refuses to overwrite unless `force`.
fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ServiceConfig::default().save_to(path)?;
    Ok(())
}
