//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use locwatch::config::ConfigFileError;
use locwatch::LocationError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to load or save the config file
    ConfigFile(ConfigFileError),
    /// Scenario file could not be read or parsed
    Scenario { path: PathBuf, reason: String },
    /// Failed to build the async runtime
    Runtime(std::io::Error),
    /// The location service rejected the subscription
    Subscribe(LocationError),
    /// Failed to write event output
    Output(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Scenario { .. } => {
                eprintln!();
                eprintln!("A scenario is a JSON object with a \"steps\" array, e.g.:");
                eprintln!("  {{\"authorization\": \"granted_while_in_use\", \"steps\": [");
                eprintln!("    {{\"step\": \"fix\", \"t_ms\": 0, \"latitude\": 47.37, \"longitude\": 8.54}},");
                eprintln!("    {{\"step\": \"wait\", \"ms\": 1000}}");
                eprintln!("  ]}}");
            }
            CliError::ConfigFile(_) => {
                eprintln!();
                eprintln!("Run 'locwatch config --init --force' to rewrite a default config file.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::ConfigFile(_) | CliError::Scenario { .. } => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Scenario { path, reason } => {
                write!(f, "Invalid scenario '{}': {}", path.display(), reason)
            }
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Subscribe(e) => write!(f, "Subscription rejected: {}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Subscribe(e) => Some(e),
            CliError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LocationError> for CliError {
    fn from(e: LocationError) -> Self {
        CliError::Subscribe(e)
    }
}
