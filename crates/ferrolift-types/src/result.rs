//! Result type alias for ferrolift operations

use crate::Error;

/// Result type alias for ferrolift operations
pub type Result<T> = std::result::Result<T, Error>;
