//! Tests registered with CMake's `add_test()`, listed through ctest

use std::path::PathBuf;

use qttest_core::{CMakeTest, parse_ctest_json};

use crate::error::{QtTestError, Result};
use crate::process;

/// Discovers tests in a CMake build directory via `ctest --show-only=json-v1`.
#[derive(Debug, Clone)]
pub struct CMakeTests {
    /// The build dir where ctest runs
    pub build_dir: PathBuf,
    ctest_program: PathBuf,
}

impl CMakeTests {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            ctest_program: PathBuf::from("ctest"),
        }
    }

    /// Use a specific ctest binary instead of the one on `PATH`.
    pub fn with_ctest_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ctest_program = program.into();
        self
    }

    /// Invokes `ctest --show-only=json-v1` and returns the listed tests.
    #[tracing::instrument(skip_all, fields(build_dir = %self.build_dir.display()))]
    pub async fn tests(&self) -> Result<Vec<CMakeTest>> {
        if self.build_dir.as_os_str().is_empty() {
            return Err(QtTestError::MissingBuildDir);
        }
        if !self.build_dir.is_dir() {
            return Err(QtTestError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("build directory does not exist: {}", self.build_dir.display()),
            )));
        }

        tracing::debug!("running ctest --show-only=json-v1");
        let output = process::capture(&self.ctest_program, ["--show-only=json-v1"], Some(&self.build_dir)).await?;
        if !output.success() {
            return Err(QtTestError::Ctest {
                code: output.code(),
                stderr: output.stderr,
            });
        }

        Ok(parse_ctest_json(&output.stdout)?)
    }
}
