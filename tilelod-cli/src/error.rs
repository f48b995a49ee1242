//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tilelod::config::ConfigFileError;
use tilelod::coord::CoordError;
use tilelod::engine::EngineError;
use tilelod::provider::ProviderError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Configuration file could not be read or written
    ConfigFile(ConfigFileError),
    /// Requested tile is outside the pyramid
    InvalidTile(CoordError),
    /// HTTP client could not be created
    Client(ProviderError),
    /// Engine could not be created
    Engine(EngineError),
    /// The exact tile could not be fetched
    Fetch(String),
    /// Failed to write output image
    ImageWrite {
        path: String,
        error: image::ImageError,
    },
    /// Failed to serialize the summary
    Json(serde_json::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Config(_) | CliError::ConfigFile(_) => {
                eprintln!();
                eprintln!("Run 'tilelod config show' to see the effective settings,");
                eprintln!("or 'tilelod config init' to write a default config file.");
            }
            CliError::Fetch(_) => {
                eprintln!();
                eprintln!("The best-effort image was still written. Check that:");
                eprintln!("  1. url_template points at a reachable tile server");
                eprintln!("  2. The server has imagery at this zoom level");
                eprintln!("  3. [fetch] timeout is long enough for the server");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::InvalidTile(e) => write!(f, "Invalid tile: {}", e),
            CliError::Client(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Engine(e) => write!(f, "Failed to create tile engine: {}", e),
            CliError::Fetch(msg) => write!(f, "Failed to fetch tile: {}", msg),
            CliError::ImageWrite { path, error } => {
                write!(f, "Failed to write image '{}': {}", path, error)
            }
            CliError::Json(e) => write!(f, "Failed to serialize summary: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::InvalidTile(e) => Some(e),
            CliError::Client(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::ImageWrite { error, .. } => Some(error),
            CliError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::InvalidTile(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}
