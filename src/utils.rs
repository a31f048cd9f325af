//! Filesystem helpers for finding test executables without CMake

use std::fs;
use std::path::{Path, PathBuf};

use qttest_core::paths::is_library;

/// Directory CMake fills with its own probe binaries
const CMAKE_FILES_DIR: &str = "CMakeFiles";

/// Returns whether the specified file is an executable
#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("exe"))
}

/// Returns whether the specified file is an executable
#[cfg(not(windows))]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

/// Recursively looks for executable files in `dir`, sorted.
///
/// `CMakeFiles` directories and shared libraries are skipped. Unreadable directories are skipped with a
/// warning.
pub fn executable_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_executables(dir, &mut files);
    files.sort();
    files
}

fn collect_executables(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "cannot read directory: {e}");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name == CMAKE_FILES_DIR {
            continue;
        }

        if path.is_dir() {
            collect_executables(&path, files);
        } else if path.is_file() && !is_library(&name) && is_executable(&path) {
            files.push(path);
        }
    }
}
