//! Why a configuration could not be loaded or resolved
//!
//! Each variant names the server, unit or setting at fault so the message can
//! be printed as is before the process exits.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file is missing or cannot be read
    #[error("cannot read configuration '{path}': {source}")]
    Unreadable {
        /// Path that was looked up
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The file is not YAML or does not fit the schema
    #[error("malformed configuration '{path}': {message}")]
    Malformed {
        /// Configuration file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Defaults, files and environment could not be merged
    #[error("cannot assemble configuration: {message}")]
    Layering {
        /// Message from the layering step
        message: String,
    },

    /// A unit names a server that is not defined
    #[error("{unit}.{key}: unknown server '{server}'")]
    UnknownServer {
        /// Unit holding the reference
        unit: String,
        /// Setting holding the reference (`source`, `target` or `server`)
        key: &'static str,
        /// The server name that did not resolve
        server: String,
    },

    /// A referenced server has neither a password nor a key
    #[error("server '{server}' has no credentials, set password, key_file or key_file with cert_file")]
    NoCredentials {
        /// Server name
        server: String,
    },

    /// A syncer asks for bidirectional sync
    #[error("{unit}.mode: twoway sync is not supported, use 'server' or 'local'")]
    TwowayUnsupported {
        /// Syncer name
        unit: String,
    },

    /// Two servers, or two units of one section, share a name
    #[error("duplicate {scope} name '{name}'")]
    Duplicate {
        /// `server` or `unit`
        scope: &'static str,
        /// The repeated name
        name: String,
    },

    /// A required setting is empty
    #[error("missing required setting: {key}")]
    Missing {
        /// Setting path
        key: String,
    },

    /// A tuning value is out of range
    #[error("invalid value for '{key}': {message}")]
    OutOfRange {
        /// Setting path, `<unit>.<field>`
        key: String,
        /// What the value must satisfy
        message: String,
    },

    /// `logging.level` is not a known level
    #[error("unknown log level '{level}', expected one of: trace, debug, info, warn, error")]
    UnknownLogLevel {
        /// The configured level
        level: String,
    },

    /// The directory of the running executable could not be determined
    #[error("cannot locate the executable directory: {message}")]
    ExecutableDir {
        /// Lookup failure
        message: String,
    },

    /// A configuration could not be rendered back to YAML
    #[error("cannot encode configuration: {message}")]
    Encoding {
        /// Serializer message
        message: String,
    },
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Encoding {
            message: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        Self::Layering {
            message: error.to_string(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Setting `<unit>.<field>` is out of range
    pub fn out_of_range(unit: &str, field: &str, message: impl Into<String>) -> Self {
        Self::OutOfRange {
            key: format!("{}.{}", unit, field),
            message: message.into(),
        }
    }

    /// Whether the error is about the file itself rather than its content
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            Self::Unreadable { .. } | Self::Malformed { .. } | Self::ExecutableDir { .. }
        )
    }
}
