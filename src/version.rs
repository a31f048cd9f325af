//! qttest version information.
//!
//! The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time. Prefer this constant over
//! repeating `env!("CARGO_PKG_VERSION")`.

/// The qttest version string (for example, `0.4.0`).
pub const QTTEST_VERSION: &str = env!("CARGO_PKG_VERSION");
