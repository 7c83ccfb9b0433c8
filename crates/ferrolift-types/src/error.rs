//! Error types and handling for ferrolift
//!
//! Every failure in the transfer pipeline is reported as an [`Error`] value.
//! The variants follow the pipeline's failure taxonomy: connection failures
//! are retried by the owning loop, per-file failures stay inside a worker
//! iteration, and configuration failures terminate the process.

use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - logged, nothing to undo
    Low,
    /// Medium severity - the item is retried on the next pass
    Medium,
    /// High severity - the owning task must be replaced
    High,
    /// Critical severity - the process cannot continue
    Critical,
}

/// Main error type for ferrolift operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// File not found
    #[error("File not found: {path}")]
    NotFound {
        /// Path to the file that was not found
        path: PathBuf,
    },

    /// Permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path to the file with permission issues
        path: PathBuf,
    },

    /// Session could not be opened or was lost
    #[error("Connection error: {message}")]
    Connection {
        /// Error message describing the connection issue
        message: String,
    },

    /// A step of a directory walk failed
    #[error("Scan error at {path}: {message}")]
    Scan {
        /// Directory that could not be listed
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Data movement for one file failed
    #[error("Transfer of {path} failed: {message}")]
    Transfer {
        /// Source path of the failed transfer
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Operation cancelled by a stop request
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation timed out
    #[error("Operation timed out after {seconds} seconds")]
    Timeout {
        /// Number of seconds after which the operation timed out
        seconds: u64,
    },

    /// Staged file could not be committed to its final path
    #[error("Failed to rename {from} to {to}: {message}")]
    Rename {
        /// Staged temp file
        from: PathBuf,
        /// Final destination path
        to: PathBuf,
        /// Error message from the last attempt
        message: String,
    },

    /// Source file could not be removed after a successful transfer
    #[error("Failed to remove source {path}: {message}")]
    RemoveSource {
        /// Source path that is still present
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Connection errors
    Connection,
    /// Directory walk errors
    Scan,
    /// Per-file transfer errors
    Transfer,
    /// Atomic commit errors
    Rename,
    /// Source cleanup errors
    RemoveSource,
    /// Configuration errors
    Config,
    /// Cancellation
    Cancelled,
    /// Timeout
    Timeout,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::NotFound { .. } | Self::PermissionDenied { .. } => {
                ErrorKind::Io
            }
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Scan { .. } => ErrorKind::Scan,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Rename { .. } => ErrorKind::Rename,
            Self::RemoveSource { .. } => ErrorKind::RemoveSource,
            Self::Config { .. } => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } => ErrorSeverity::Medium,
            Self::NotFound { .. } | Self::PermissionDenied { .. } => ErrorSeverity::Medium,
            Self::Connection { .. } => ErrorSeverity::High,
            Self::Scan { .. } => ErrorSeverity::Low,
            Self::Transfer { .. } | Self::Timeout { .. } | Self::Rename { .. } => {
                ErrorSeverity::Medium
            }
            Self::RemoveSource { .. } => ErrorSeverity::Low,
            Self::Config { .. } => ErrorSeverity::Critical,
            Self::Cancelled => ErrorSeverity::Low,
            Self::Other { .. } => ErrorSeverity::Medium,
        }
    }

    /// Check if this error is recoverable by retrying on a later pass
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config { .. } | Self::Cancelled => false,
            Self::PermissionDenied { .. } => false,
            _ => true,
        }
    }

    /// Check if this error means the session is gone and its owner must reconnect
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new scan error
    pub fn scan<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Scan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new transfer error
    pub fn transfer<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Transfer {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new rename error
    pub fn rename<P: Into<PathBuf>, Q: Into<PathBuf>, S: Into<String>>(
        from: P,
        to: Q,
        message: S,
    ) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
            message: message.into(),
        }
    }

    /// Create a new source removal error
    pub fn remove_source<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::RemoveSource {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

impl Error {
    /// Convert an I/O error raised while touching `path`, keeping the not-found
    /// and permission cases distinguishable
    pub fn from_io<P: Into<PathBuf>>(error: &std::io::Error, path: P) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path: path.into() },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: path.into() },
            _ => Self::Io {
                message: format!("{}: {}", path.into().display(), error),
            },
        }
    }
}
