//! Version information.
//!
//! Taken from Cargo metadata at compile time so the CLI and the console banner agree.

/// The fieldtest version string (for example, `0.1.0`).
pub const FIELDTEST_VERSION: &str = env!("CARGO_PKG_VERSION");
