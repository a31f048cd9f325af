//! Harness error type

use std::path::PathBuf;

use miette::Diagnostic;
use qttest_core::CoreError;
use thiserror::Error;

/// Errors that occur while discovering or running QtTest executables
#[derive(Debug, Error, Diagnostic)]
pub enum QtTestError {
    #[error("could not find out the CMake build directory")]
    #[diagnostic(code(qttest::no_build_dir))]
    MissingBuildDir,

    #[error("qttest: file doesn't exist: {}", .0.display())]
    #[diagnostic(code(qttest::missing_executable))]
    MissingExecutable(PathBuf),

    #[error("failed to spawn {}: {source}", program.display())]
    #[diagnostic(code(qttest::spawn))]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run ctest (exit code {code:?}): {stderr}")]
    #[diagnostic(code(qttest::ctest), help("is the build directory configured with CMake?"))]
    Ctest { code: Option<i32>, stderr: String },

    #[error("qttest: failed to run -functions, stdout={stdout}; stderr={stderr}; code={code:?}")]
    #[diagnostic(code(qttest::functions))]
    Functions {
        stdout: String,
        stderr: String,
        code: Option<i32>,
    },

    #[error("qttest: failed to run ldd on {}", .0.display())]
    #[diagnostic(code(qttest::ldd))]
    Ldd(PathBuf),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),

    #[error("invalid filter expression: {0}")]
    #[diagnostic(code(qttest::regex))]
    Regex(#[from] regex::Error),

    #[error("I/O error: {0}")]
    #[diagnostic(code(qttest::io))]
    Io(#[from] std::io::Error),
}

/// Result alias for harness operations
pub type Result<T> = std::result::Result<T, QtTestError>;
