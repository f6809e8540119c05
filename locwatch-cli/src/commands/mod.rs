//! CLI command implementations.
//!
//! - [`replay`] - Replay a scenario file through the location service
//! - [`config`] - Show, locate or initialize the configuration file

pub mod common;
pub mod config;
pub mod replay;
