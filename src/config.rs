//! Runner configuration
//!
//! Defaults match what a developer shell provides (`ctest` and `ldd` on `PATH`). Each field can be seeded
//! from the environment and then overridden by CLI flags.

use std::env;
use std::path::PathBuf;

/// Overrides the ctest program
pub const CTEST_ENV: &str = "QTTEST_CTEST";
/// Overrides the ldd program
pub const LDD_ENV: &str = "QTTEST_LDD";
/// Directory receiving `.tap`/`.txt` logs
pub const OUTPUT_DIR_ENV: &str = "QTTEST_OUTPUT_DIR";

/// How discovery and runs invoke external programs and where they leave their logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Program used to list CMake tests
    pub ctest_program: PathBuf,
    /// Program used to inspect shared library dependencies (Linux)
    pub ldd_program: PathBuf,
    /// Where TAP and txt logs are written; `None` means the run's working directory
    pub output_dir: Option<PathBuf>,
    /// Also ask QtTest to print its txt log to stdout
    pub echo_stdout: bool,
    /// Log every probe and its output
    pub verbose: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            ctest_program: PathBuf::from("ctest"),
            ldd_program: PathBuf::from("ldd"),
            output_dir: None,
            echo_stdout: true,
            verbose: false,
        }
    }
}

impl RunnerConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overridden by `QTTEST_CTEST`, `QTTEST_LDD` and `QTTEST_OUTPUT_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`RunnerConfig::from_env`] with an explicit variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(ctest) = non_empty(CTEST_ENV) {
            config.ctest_program = PathBuf::from(ctest);
        }
        if let Some(ldd) = non_empty(LDD_ENV) {
            config.ldd_program = PathBuf::from(ldd);
        }
        if let Some(dir) = non_empty(OUTPUT_DIR_ENV) {
            config.output_dir = Some(PathBuf::from(dir));
        }
        config
    }

    /// Set the ctest program
    pub fn with_ctest_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ctest_program = program.into();
        self
    }

    /// Set the ldd program
    pub fn with_ldd_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ldd_program = program.into();
        self
    }

    /// Set the log output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Enable or disable echoing the txt log to stdout
    pub fn with_echo_stdout(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    /// Enable or disable verbose probing
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
