//! Service configuration.
//!
//! [`ServiceConfig`] holds the settings shared by every subscriber. It has
//! in-code defaults and can be loaded from or saved to an INI file:
//!
//! ```ini
//! [accuracy]
//! best_meters = 10
//! balanced_meters = 100
//! low_meters = 1000
//! significant_change_meters = 3000
//!
//! [permission]
//! default_level = when_in_use
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 100
//! max_delay_ms = 30000
//! multiplier = 2
//!
//! [events]
//! channel_capacity = 64
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ServiceConfig, DEFAULT_EVENT_CHANNEL_CAPACITY};
