//! Common types and utilities shared across CLI commands.

use std::path::Path;

use clap::ValueEnum;
use locwatch::config::{config_file_path, ServiceConfig};
use locwatch::AccuracyTier;

use crate::error::CliError;

/// Accuracy tier selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum TierArg {
    /// Highest accuracy, highest power draw
    Best,
    /// Roughly block-level accuracy
    Balanced,
    /// Roughly city-level accuracy
    Low,
    /// Significant moves only, lowest power draw
    SignificantChange,
}

impl From<TierArg> for AccuracyTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Best => AccuracyTier::Best,
            TierArg::Balanced => AccuracyTier::Balanced,
            TierArg::Low => AccuracyTier::Low,
            TierArg::SignificantChange => AccuracyTier::SignificantChange,
        }
    }
}

/// Load service settings: `--config` path if given, else the default path.
///
/// A missing file yields defaults.
pub fn load_service_config(path: Option<&Path>) -> Result<ServiceConfig, CliError> {
    let config = match path {
        Some(path) => ServiceConfig::load_from(path)?,
        None => ServiceConfig::load_from(&config_file_path())?,
    };
    Ok(config)
}
