#![forbid(unsafe_code)]
//! Discover, list and run QtTest executables of a CMake build directory.
//!
//! Executables are found through ctest (or a directory scan), filtered down to real QtTests, and run with
//! TAP and txt logs. Every slot's outcome is then classified by [`qttest_core`].
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod cmake;
pub mod config;
pub mod error;
pub mod process;
pub mod qttest;
pub mod utils;
pub mod version;

pub use cmake::CMakeTests;
pub use config::RunnerConfig;
pub use error::{QtTestError, Result};
pub use qttest::{
    CtestDiscovery, DirectoryScanDiscovery, DiscoveredExecutable, QtTest, QtTestSlot, QtTests, RunReport, TestCommand,
    TestDiscovery,
};
pub use version::QTTEST_VERSION;

pub use qttest_core::{BenchmarkResult, RunSummary, SlotOutcome, TestFailure};
