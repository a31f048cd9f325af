//! Model of `ctest --show-only=json-v1` output.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::CoreError;
use crate::paths::basename;

#[derive(Debug, Deserialize)]
struct CtestInfo {
    #[serde(default)]
    tests: Vec<CtestEntry>,
}

#[derive(Debug, Deserialize)]
struct CtestEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    command: Vec<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    properties: Vec<CtestProperty>,
}

#[derive(Debug, Deserialize)]
struct CtestProperty {
    name: String,
    #[serde(default)]
    value: Value,
}

/// A test registered with CMake's `add_test()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CMakeTest {
    /// Name given to `add_test()`
    pub name: String,
    /// Executable followed by its arguments
    pub command: Vec<String>,
    /// `WORKING_DIRECTORY` property, if set
    pub cwd: Option<String>,
}

impl CMakeTest {
    /// Stable identifier: the command joined with commas.
    pub fn id(&self) -> String {
        self.command.join(",")
    }

    /// Basename of the executable.
    pub fn label(&self) -> &str {
        self.executable_path().map(basename).unwrap_or_default()
    }

    pub fn executable_path(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

/// Parse ctest's JSON listing. A document without a `tests` key yields no tests.
///
/// Tests without a command (ctest reports those when the executable target is missing) are dropped.
pub fn parse_ctest_json(json: &str) -> Result<Vec<CMakeTest>, CoreError> {
    let info: CtestInfo = serde_json::from_str(json).map_err(|e| CoreError::ctest_json(json, &e))?;

    let tests = info
        .tests
        .into_iter()
        .filter(|entry| !entry.command.is_empty())
        .map(|entry| {
            let working_dir = entry
                .properties
                .iter()
                .find(|p| p.name == "WORKING_DIRECTORY")
                .and_then(|p| p.value.as_str())
                .map(str::to_string);
            CMakeTest {
                name: entry.name.unwrap_or_default(),
                command: entry.command,
                cwd: working_dir.or(entry.cwd),
            }
        })
        .collect();

    Ok(tests)
}
