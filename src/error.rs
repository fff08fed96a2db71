//! Error types for bench-plot

use thiserror::Error;

/// Result type alias for bench-plot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bench-plot
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),


    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Nothing to plot for test '{title}': no samples recorded")]
    EmptyRecord { title: String },

    #[error("Failed to draw chart: {0}")]
    DrawError(String),
}
