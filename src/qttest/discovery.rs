//! Discovery I/O boundary
//!
//! Finding candidate executables is kept behind [`TestDiscovery`] so the collection can be filled from ctest
//! or from a plain directory scan, and tests can substitute either.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::cmake::CMakeTests;
use crate::error::Result;
use crate::utils::executable_files;

/// An executable that may be a QtTest, and where it should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredExecutable {
    pub path: PathBuf,
    /// ctest's `WORKING_DIRECTORY`, when set
    pub working_dir: Option<PathBuf>,
}

impl DiscoveredExecutable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            working_dir: None,
        }
    }
}

/// Finds candidate test executables in a build directory.
pub trait TestDiscovery {
    /// Executables found under `build_dir`, without duplicates.
    fn discover(&self, build_dir: &Path) -> impl Future<Output = Result<Vec<DiscoveredExecutable>>> + Send;
}

/// Asks ctest for the tests registered with `add_test()` (the usual behavior).
#[derive(Debug, Clone)]
pub struct CtestDiscovery {
    pub ctest_program: PathBuf,
}

impl Default for CtestDiscovery {
    fn default() -> Self {
        Self {
            ctest_program: PathBuf::from("ctest"),
        }
    }
}

impl TestDiscovery for CtestDiscovery {
    async fn discover(&self, build_dir: &Path) -> Result<Vec<DiscoveredExecutable>> {
        let ctests = CMakeTests::new(build_dir)
            .with_ctest_program(&self.ctest_program)
            .tests()
            .await?;

        let mut found: Vec<DiscoveredExecutable> = Vec::new();
        for ctest in &ctests {
            let Some(path) = ctest.executable_path() else {
                continue;
            };
            // One executable can be registered under several test names
            if found.iter().any(|d| d.path == Path::new(path)) {
                tracing::debug!(test = %ctest.label(), "executable already discovered");
                continue;
            }
            found.push(DiscoveredExecutable {
                path: PathBuf::from(path),
                working_dir: ctest.cwd.as_ref().map(PathBuf::from),
            });
        }
        Ok(found)
    }
}

/// Scans the build directory for executable files, for builds without ctest.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryScanDiscovery;

impl TestDiscovery for DirectoryScanDiscovery {
    async fn discover(&self, build_dir: &Path) -> Result<Vec<DiscoveredExecutable>> {
        let build_dir = build_dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || executable_files(&build_dir))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(files.into_iter().map(DiscoveredExecutable::new).collect())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn test_directory_scan_finds_executables() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("test1");
        fs::write(&exe, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(dir.path().join("README"), b"").unwrap();

        let found = DirectoryScanDiscovery.discover(dir.path()).await.unwrap();
        assert_eq!(found, vec![DiscoveredExecutable::new(exe)]);
    }

    #[tokio::test]
    async fn test_ctest_discovery_dedupes_and_keeps_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let ctest = dir.path().join("fake-ctest");
        let json = r#"{"kind":"ctestInfo","version":{"major":1,"minor":0},"tests":[
            {"name":"test1","command":["/build/test1"],"properties":[{"name":"WORKING_DIRECTORY","value":"/build/data"}]},
            {"name":"test1-again","command":["/build/test1","-platform","offscreen"]},
            {"name":"no-command"},
            {"name":"test2","command":["/build/test2"]}
        ]}"#;
        fs::write(&ctest, format!("#!/bin/sh\ncat <<'EOF'\n{json}\nEOF\n")).unwrap();
        fs::set_permissions(&ctest, fs::Permissions::from_mode(0o755)).unwrap();

        let discovery = CtestDiscovery { ctest_program: ctest };
        let found = discovery.discover(dir.path()).await.unwrap();
        assert_eq!(
            found,
            vec![
                DiscoveredExecutable {
                    path: PathBuf::from("/build/test1"),
                    working_dir: Some(PathBuf::from("/build/data")),
                },
                DiscoveredExecutable::new("/build/test2"),
            ]
        );
    }
}
