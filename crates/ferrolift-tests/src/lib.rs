//! ferrolift integration testing support
//!
//! Shared fixtures for the integration tests: file trees, tree snapshots and
//! loopback configurations.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Fixture builders used by every integration test so trees and
/// configurations look the same across scenarios.
pub mod test_utils;
