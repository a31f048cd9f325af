//! Queries over a CMake file-API codemodel.
//!
//! The codemodel is taken as a loose JSON value with a `projects` array at the root, each project holding
//! `targets` with `name`, `type`, `artifacts`, `sourceDirectory` and `fileGroups`. Missing keys are
//! treated as "no match" rather than errors, since different CMake generators omit different fields.
//!
//! ## Notes
//! - **Workaround mode**: some IDE integrations hand out codemodels whose artifact paths are bogus while the
//!   basenames are right. With `workaround` set, an artifact that does not exist on disk is matched by
//!   basename only.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::CoreError;
use crate::paths::{basename, normalize_slashes, strip_exe};

/// Parse a codemodel JSON document.
pub fn parse_codemodel(json: &str) -> Result<Value, CoreError> {
    Ok(serde_json::from_str(json)?)
}

/// Whether two executable paths refer to the same file.
pub fn filenames_are_equal(file1: &str, file2: &str, workaround: bool) -> bool {
    let mut a = normalize_slashes(strip_exe(file1));
    let mut b = normalize_slashes(strip_exe(file2));
    if cfg!(windows) {
        a = a.to_lowercase();
        b = b.to_lowercase();
    }

    if a == b {
        return true;
    }
    if !workaround {
        return false;
    }
    if Path::new(file2).exists() {
        // A real file, so the path is not bogus
        return false;
    }

    basename(&a) == basename(&b)
}

/// Iterate over every target of every project.
fn targets(codemodel: &Value) -> impl Iterator<Item = &Value> {
    codemodel
        .get("projects")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|project| project.get("targets").and_then(Value::as_array))
        .flatten()
}

fn artifacts(target: &Value) -> impl Iterator<Item = &str> {
    target
        .get("artifacts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// The C++ sources of the executable target producing `executable`.
///
/// Generated file groups and `mocs_compilation.cpp` are skipped. Returns an empty list when no target
/// matches.
pub fn cpp_files_for_executable(executable: &str, codemodel: &Value, workaround: bool) -> Vec<PathBuf> {
    for target in targets(codemodel) {
        let Some(source_dir) = target.get("sourceDirectory").and_then(Value::as_str) else {
            continue;
        };
        if target.get("type").and_then(Value::as_str) != Some("EXECUTABLE") {
            continue;
        }

        let matches = artifacts(target).any(|artifact| filenames_are_equal(executable, artifact, workaround));
        if !matches {
            continue;
        }

        let Some(file_groups) = target.get("fileGroups").and_then(Value::as_array) else {
            continue;
        };

        let cxx_group = file_groups.iter().find(|group| {
            group.get("language").and_then(Value::as_str) == Some("CXX")
                && !group.get("isGenerated").and_then(Value::as_bool).unwrap_or(false)
        });

        let Some(sources) = cxx_group.and_then(|g| g.get("sources")).and_then(Value::as_array) else {
            continue;
        };

        return sources
            .iter()
            .filter_map(Value::as_str)
            .filter(|source| !source.ends_with("mocs_compilation.cpp"))
            .map(|source| Path::new(source_dir).join(source))
            .collect();
    }

    tracing::debug!(executable, "could not find cpp files for executable");
    Vec::new()
}

/// The CMake target name producing `executable`.
pub fn target_name_for_executable(executable: &str, codemodel: &Value, workaround: bool) -> Option<String> {
    targets(codemodel)
        .filter(|target| artifacts(target).any(|artifact| filenames_are_equal(executable, artifact, workaround)))
        .find_map(|target| target.get("name").and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codemodel() -> Value {
        json!({
            "projects": [
                {
                    "name": "qt_test",
                    "targets": [
                        {
                            "name": "helpers",
                            "type": "STATIC_LIBRARY",
                            "sourceDirectory": "/repo/test/qt_test",
                            "artifacts": ["/repo/test/qt_test/build-dev/libhelpers.a"]
                        },
                        {
                            "name": "test1",
                            "type": "EXECUTABLE",
                            "sourceDirectory": "/repo/test/qt_test",
                            "artifacts": ["/repo/test/qt_test/build-dev/test1"],
                            "fileGroups": [
                                { "language": "CXX", "isGenerated": true, "sources": ["build-dev/test1_autogen/mocs_compilation.cpp"] },
                                { "language": "CXX", "sources": ["test1.cpp", "build-dev/test1_autogen/mocs_compilation.cpp"] }
                            ]
                        },
                        {
                            "name": "test2",
                            "type": "EXECUTABLE",
                            "sourceDirectory": "/repo/test/qt_test",
                            "artifacts": ["\\repo\\test\\qt_test\\build-dev\\test2.exe"],
                            "fileGroups": [
                                { "language": "CXX", "sources": ["test2.cpp"] }
                            ]
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_cpp_files_skip_generated_and_mocs() {
        let files = cpp_files_for_executable("/repo/test/qt_test/build-dev/test1", &codemodel(), false);
        assert_eq!(files, vec![PathBuf::from("/repo/test/qt_test/test1.cpp")]);
    }

    #[test]
    fn test_backslash_artifacts_match() {
        let files = cpp_files_for_executable("/repo/test/qt_test/build-dev/test2", &codemodel(), false);
        assert_eq!(files.len(), 1);
        assert_eq!(
            target_name_for_executable("/repo/test/qt_test/build-dev/test2.exe", &codemodel(), false).as_deref(),
            Some("test2")
        );
    }

    #[test]
    fn test_target_name() {
        assert_eq!(
            target_name_for_executable("/repo/test/qt_test/build-dev/test1", &codemodel(), false).as_deref(),
            Some("test1")
        );
        assert_eq!(target_name_for_executable("/elsewhere/test9", &codemodel(), false), None);
    }

    #[test]
    fn test_workaround_matches_basename_of_bogus_path() {
        assert!(!filenames_are_equal("/real/build/test1", "/bogus/path/test1", false));
        assert!(filenames_are_equal("/real/build/test1", "/bogus/path/test1", true));
        assert!(!filenames_are_equal("/real/build/test1", "/bogus/path/test2", true));
        assert_eq!(
            target_name_for_executable("/real/build/test1", &codemodel(), true).as_deref(),
            Some("test1")
        );
    }

    #[test]
    fn test_no_projects() {
        assert!(cpp_files_for_executable("test1", &json!({}), false).is_empty());
        assert!(parse_codemodel("[1, 2").is_err());
    }
}
