/// Error handling module for the server supervisor.
///
/// This module defines the error types used throughout the library.
/// Registry load/save errors are returned to the caller immediately, while
/// per-server execution errors are captured inside a
/// [`DispatchReport`](crate::server::DispatchReport) and never abort a dispatch.
///
/// # Example
///
/// ```
/// use server_manage::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::NotFound(path)) => println!("No registry at {}", path.display()),
///         Err(Error::Conflict(names)) => println!("Already registered: {}", names.join(", ")),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the server-manage library.
#[derive(Error, Debug)]
pub enum Error {
    /// The registry or settings file does not exist.
    #[error("Registry file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but is not a valid name-to-path mapping.
    ///
    /// This error occurs when:
    /// - The content is not valid JSON
    /// - A value is not a string
    /// - A server name appears more than once
    /// - A path cannot be represented as UTF-8 when saving
    #[error("Invalid registry format: {0}")]
    Format(String),

    /// Reading or writing a file failed.
    ///
    /// This error occurs when:
    /// - The target directory cannot be created
    /// - Permission is denied or the disk is full
    /// - The temporary file cannot be renamed into place
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File or directory the operation was acting on.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: std::io::Error,
    },

    /// `add` was asked to insert names that are already registered.
    ///
    /// Holds every conflicting name from the batch, sorted.
    #[error("Cannot overwrite existing servers: {}", .0.join(", "))]
    Conflict(Vec<String>),

    /// The requested lifecycle action is not one of start, restart or update.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// A name or path failed validation before being stored.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The external executable could not be run or exited unsuccessfully.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The external executable did not finish within the configured bound.
    #[error("Timed out after {after:?}: {}", .path.display())]
    Timeout {
        /// Executable that was running.
        path: PathBuf,
        /// Configured bound that elapsed.
        after: Duration,
    },
}

impl Error {
    /// Wraps an [`std::io::Error`] together with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for server-manage operations.
pub type Result<T> = std::result::Result<T, Error>;
