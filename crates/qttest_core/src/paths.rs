//! Filename helpers shared by discovery, the codemodel queries and the TAP reader.
//!
//! ## Notes
//! - Executables are compared without their `.exe` suffix so Windows and Unix build trees behave alike.
//! - Library detection ignores trailing version numbers (`libFoo.so.2.0.9` is still a `.so`).

use std::path::{Component, Path, PathBuf};

/// Extensions that mark a file as a shared library.
pub const LIBRARY_EXTENSIONS: &[&str] = &["so", "dll", "dylib"];

/// Strip a trailing `.exe`, if any.
pub fn strip_exe(name: &str) -> &str {
    name.strip_suffix(".exe").unwrap_or(name)
}

/// Replace Windows separators with forward slashes.
pub fn normalize_slashes(name: &str) -> String {
    name.replace('\\', "/")
}

/// Return whether `filename` names a shared library.
///
/// The last non-numeric extension decides, so `libQt6Test.so.6.5.0` is a library while `test1` is not.
pub fn is_library(filename: &str) -> bool {
    let parts: Vec<&str> = filename.split('.').collect();
    if parts.len() <= 1 {
        return false;
    }

    parts
        .iter()
        .rev()
        .find(|ext| !is_numeric(ext))
        .is_some_and(|ext| LIBRARY_EXTENSIONS.contains(ext))
}

fn is_numeric(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit())
}

/// Strip the first parenthesised group from a TAP record name.
///
/// QtTest names records `testA()` or, for data-driven slots, `testA(row 1)`. Both map to `testA`.
pub fn slot_name_from_record(name: &str) -> String {
    let Some(open) = name.find('(') else {
        return name.trim().to_string();
    };

    match name.rfind(')') {
        Some(close) if close > open => {
            let mut result = String::with_capacity(name.len());
            result.push_str(&name[..open]);
            result.push_str(&name[close + 1..]);
            result.trim().to_string()
        }
        _ => name.trim().to_string(),
    }
}

/// The data tag of a record of a data-driven slot: `row 1` for `testA(row 1)`, `None` for `testA()`.
pub fn data_tag_from_record(name: &str) -> Option<&str> {
    let open = name.find('(')?;
    let close = name.rfind(')')?;
    let tag = name.get(open + 1..close)?.trim();
    (!tag.is_empty()).then_some(tag)
}

/// `path` expressed relative to `base`, with `..` where `path` lies outside it.
///
/// Both paths must be absolute (or both relative) and free of `..`; otherwise `None`.
pub fn relative_path(path: &Path, base: &Path) -> Option<PathBuf> {
    if path.is_absolute() != base.is_absolute() {
        return None;
    }
    let path: Vec<Component> = path.components().filter(|c| *c != Component::CurDir).collect();
    let base: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();
    if path.iter().chain(&base).any(|c| *c == Component::ParentDir) {
        return None;
    }

    let common = path.iter().zip(&base).take_while(|(a, b)| a == b).count();
    // Different drive or root
    if common == 0 && path.first().is_some_and(|c| matches!(c, Component::Prefix(_) | Component::RootDir)) {
        return None;
    }

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &path[common..] {
        relative.push(component.as_os_str());
    }
    Some(relative)
}

/// Return the final path component of `path`, accepting both separator styles.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
