//! CLI module for qttest
//!
//! ## Commands
//!
//! - `list <BUILD_DIR>` - List the QtTest executables
//! - `slots <BUILD_DIR>` - List the executables with their slots
//! - `run <BUILD_DIR>` - Run the tests (pytest-style report)
//! - `which <BUILD_DIR> <SLOT>` - Find the executables having a slot
//! - `sources <CODEMODEL> <EXECUTABLE>` - Show the C++ sources and CMake target of an executable
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `report` - Run reporting
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod report;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use crate::error::QtTestError;
use crate::version::QTTEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Library errors are rendered as miette diagnostics.
impl From<QtTestError> for CliError {
    fn from(err: QtTestError) -> Self {
        Self::failure(format!("{:?}", miette::Report::new(err)))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Discover and run the QtTest executables of a CMake build directory
#[derive(Parser, Debug)]
#[command(name = "qttest")]
#[command(version = QTTEST_VERSION)]
#[command(about = "Discover and run the QtTest executables of a CMake build directory", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log every probe and its output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// How executables are found and filtered
#[derive(Args, Debug, Clone)]
pub struct DiscoveryArgs {
    /// CMake build directory
    #[arg(value_name = "BUILD_DIR")]
    pub build_dir: PathBuf,

    /// Scan the build directory for executables instead of asking ctest
    #[arg(long)]
    pub scan: bool,

    /// Drop executables whose path matches this regex
    #[arg(long, value_name = "REGEX")]
    pub exclude: Option<String>,

    /// Keep only executables whose path matches this regex
    #[arg(long, value_name = "REGEX")]
    pub only: Option<String>,

    /// Keep executables that don't link to QtTest (Linux)
    #[arg(long)]
    pub no_link_check: bool,

    /// Keep only executables that answer -help like a QtTest (runs every executable)
    #[arg(long)]
    pub help_check: bool,

    /// ctest program to use
    #[arg(long, value_name = "PROGRAM")]
    pub ctest: Option<PathBuf>,

    /// ldd program to use
    #[arg(long, value_name = "PROGRAM")]
    pub ldd: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the QtTest executables
    List {
        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// List the executables with their slots
    Slots {
        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Run the tests
    Run {
        #[command(flatten)]
        discovery: DiscoveryArgs,
        /// Run only this slot, in every executable that has it
        #[arg(long, value_name = "SLOT")]
        slot: Option<String>,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        stop_on_fail: bool,
        /// Directory for the .tap and .txt logs (default: each test's working directory)
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Echo the test output while running
        #[arg(short = 's', long)]
        show_output: bool,
    },

    /// Find the executables having a slot
    Which {
        #[command(flatten)]
        discovery: DiscoveryArgs,
        /// Slot name
        #[arg(value_name = "SLOT")]
        slot: String,
    },

    /// Show the C++ sources and CMake target producing an executable
    Sources {
        /// CMake file-API codemodel (JSON)
        #[arg(value_name = "CODEMODEL")]
        codemodel: PathBuf,
        /// Executable path, as listed by `qttest list`
        #[arg(value_name = "EXECUTABLE")]
        executable: String,
        /// Match by basename when the codemodel's artifact paths don't exist
        #[arg(long)]
        workaround: bool,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub async fn run() {
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
async fn execute(cli: Cli) -> CliResult<ExitCode> {
    let verbose = cli.verbose;
    match cli.command {
        Command::List { discovery } => {
            let config = commands::runner_config(&discovery, verbose);
            commands::list(&discovery, config).await
        }
        Command::Slots { discovery } => {
            let config = commands::runner_config(&discovery, verbose);
            commands::slots(&discovery, config).await
        }
        Command::Run {
            discovery,
            slot,
            stop_on_fail,
            output_dir,
            show_output,
        } => {
            let mut config = commands::runner_config(&discovery, verbose);
            if let Some(dir) = output_dir {
                std::fs::create_dir_all(&dir)
                    .map_err(|e| CliError::failure(format!("Error creating {}: {}", dir.display(), e)))?;
                config = config.with_output_dir(dir);
            }
            let mut reporter = report::ConsoleReporter::new(verbose);
            commands::run(
                &discovery,
                config,
                slot.as_deref(),
                stop_on_fail,
                show_output,
                &mut reporter,
            )
            .await
        }
        Command::Which { discovery, slot } => {
            let config = commands::runner_config(&discovery, verbose);
            commands::which(&discovery, config, &slot).await
        }
        Command::Sources {
            codemodel,
            executable,
            workaround,
        } => commands::sources(&codemodel, &executable, workaround),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_list() {
        let cli = Cli::try_parse_from(["qttest", "list", "build-dev"]).unwrap();
        if let Command::List { discovery } = cli.command {
            assert_eq!(discovery.build_dir, PathBuf::from("build-dev"));
            assert!(!discovery.scan);
            assert!(!discovery.no_link_check);
        } else {
            panic!("Expected List command");
        }
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["qttest", "run", "build", "-x", "--slot", "testB", "-v"]).unwrap();
        assert!(cli.verbose);
        if let Command::Run {
            slot,
            stop_on_fail,
            output_dir,
            show_output,
            ..
        } = cli.command
        {
            assert_eq!(slot.as_deref(), Some("testB"));
            assert!(stop_on_fail);
            assert!(output_dir.is_none());
            assert!(!show_output);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_discovery_flags() {
        let cli = Cli::try_parse_from([
            "qttest",
            "slots",
            "build",
            "--scan",
            "--exclude",
            "tools/",
            "--only",
            "test[0-9]",
            "--no-link-check",
            "--help-check",
            "--ctest",
            "/opt/cmake/bin/ctest",
        ])
        .unwrap();
        if let Command::Slots { discovery } = cli.command {
            assert!(discovery.scan);
            assert_eq!(discovery.exclude.as_deref(), Some("tools/"));
            assert_eq!(discovery.only.as_deref(), Some("test[0-9]"));
            assert!(discovery.no_link_check);
            assert!(discovery.help_check);
            assert_eq!(discovery.ctest, Some(PathBuf::from("/opt/cmake/bin/ctest")));
        } else {
            panic!("Expected Slots command");
        }
    }

    #[test]
    fn test_cli_parse_which_and_sources() {
        let cli = Cli::try_parse_from(["qttest", "which", "build", "testF"]).unwrap();
        assert!(matches!(cli.command, Command::Which { ref slot, .. } if slot == "testF"));

        let cli = Cli::try_parse_from(["qttest", "sources", "codemodel.json", "build/test1", "--workaround"]).unwrap();
        if let Command::Sources { workaround, executable, .. } = cli.command {
            assert!(workaround);
            assert_eq!(executable, "build/test1");
        } else {
            panic!("Expected Sources command");
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["qttest"]).is_err());
        assert!(Cli::try_parse_from(["qttest", "which", "build"]).is_err());
    }

    #[test]
    fn test_library_errors_become_failures() {
        let err: CliError = QtTestError::MissingBuildDir.into();
        assert_eq!(err.exit_code, ExitCode::FAILURE);
        assert!(err.message.contains("could not find out the CMake build directory"));
    }
}
