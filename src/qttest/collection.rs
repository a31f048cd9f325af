//! The set of QtTest executables in a build directory

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tokio::task::JoinSet;

use super::discovery::{CtestDiscovery, TestDiscovery};
use super::executable::{QtTest, list_slots, probe_help, probe_links};
use crate::config::RunnerConfig;
use crate::error::{QtTestError, Result};

/// Represents the set of all QtTest executables found in a build directory.
#[derive(Debug, Default)]
pub struct QtTests {
    pub executables: Vec<QtTest>,
    config: Arc<RunnerConfig>,
}

impl QtTests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            executables: Vec::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.executables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }

    /// Adds an executable that shares this collection's configuration.
    pub fn push(&mut self, filename: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> &mut QtTest {
        self.executables
            .push(QtTest::with_config(filename, build_dir, self.config.clone()));
        let last = self.executables.len() - 1;
        &mut self.executables[last]
    }

    /// Fills the collection with every executable ctest knows about. Filter them afterwards.
    pub async fn discover_via_cmake(&mut self, build_dir: &Path) -> Result<usize> {
        let discovery = CtestDiscovery {
            ctest_program: self.config.ctest_program.clone(),
        };
        self.discover(&discovery, build_dir).await
    }

    /// Replaces the collection with what `discovery` finds in `build_dir`. Returns the number of executables.
    #[tracing::instrument(skip_all, fields(build_dir = %build_dir.display()))]
    pub async fn discover(&mut self, discovery: &impl TestDiscovery, build_dir: &Path) -> Result<usize> {
        let found = discovery.discover(build_dir).await?;
        self.executables.clear();
        for exe in found {
            let cwd = exe.working_dir.unwrap_or_else(|| build_dir.to_path_buf());
            self.push(exe.path, cwd);
        }
        tracing::debug!(count = self.executables.len(), "discovered executables");
        Ok(self.executables.len())
    }

    /// Removes executables that don't link to libQtTest.so.
    ///
    /// Executables whose linkage can't be determined (ldd failed, or not on Linux) are kept.
    pub async fn remove_non_linking(&mut self) {
        if !cfg!(target_os = "linux") {
            return;
        }

        let mut set = JoinSet::new();
        for (idx, ex) in self.executables.iter().enumerate() {
            let ldd = self.config.ldd_program.clone();
            let filename = ex.filename.clone();
            let verbose = ex.verbose;
            set.spawn(async move { (idx, probe_links(ldd, filename, verbose).await) });
        }

        let mut keep = vec![true; self.executables.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(links))) => keep[idx] = links,
                Ok((idx, Err(e))) => {
                    tracing::warn!(test = %self.executables[idx].filename.display(), "keeping test: {e}");
                }
                Err(e) => tracing::warn!("ldd probe task failed: {e}"),
            }
        }
        self.retain_by_index(&keep);
    }

    /// Removes executables that don't print QtTest's usage for `-help`.
    ///
    /// Runs every executable, so only use it on build dirs whose executables are all tests.
    pub async fn remove_by_running_help(&mut self) {
        let mut set = JoinSet::new();
        for (idx, ex) in self.executables.iter().enumerate() {
            let filename = ex.filename.clone();
            let cwd = ex.build_dir.clone();
            set.spawn(async move { (idx, probe_help(filename, cwd).await) });
        }

        let mut keep = vec![false; self.executables.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, is_qttest)) => keep[idx] = is_qttest,
                Err(e) => tracing::warn!("-help probe task failed: {e}"),
            }
        }
        self.retain_by_index(&keep);
    }

    fn retain_by_index(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.executables.retain(|ex| {
            let kept = flags.next().copied().unwrap_or(true);
            if !kept {
                tracing::debug!(test = %ex.filename.display(), "removed");
            }
            kept
        });
    }

    /// Removes executables whose path matches `re`. Matching is against forward-slash paths.
    pub fn remove_matching(&mut self, re: &Regex) {
        self.executables.retain(|ex| !re.is_match(&forward_slashes(&ex.filename)));
    }

    /// Keeps only executables whose path matches `re`.
    pub fn maintain_matching(&mut self, re: &Regex) {
        self.executables.retain(|ex| re.is_match(&forward_slashes(&ex.filename)));
    }

    /// Lists the slots of every executable that hasn't been listed yet, concurrently.
    ///
    /// Executables that fail to list are left without slots; their errors are returned.
    pub async fn parse_all_slots(&mut self) -> Vec<(PathBuf, QtTestError)> {
        let mut set = JoinSet::new();
        for (idx, ex) in self.executables.iter().enumerate() {
            if ex.slots.is_some() {
                continue;
            }
            let filename = ex.filename.clone();
            let cwd = ex.build_dir.clone();
            set.spawn(async move { (idx, list_slots(filename, cwd).await) });
        }

        let mut errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(names))) => self.executables[idx].set_slot_names(names),
                Ok((idx, Err(e))) => {
                    let filename = self.executables[idx].filename.clone();
                    tracing::warn!(test = %filename.display(), "cannot list slots: {e}");
                    errors.push((filename, e));
                }
                Err(e) => tracing::warn!("slot listing task failed: {e}"),
            }
        }
        errors.sort_by(|a, b| a.0.cmp(&b.0));
        errors
    }

    /// One executable path per line.
    pub fn dump_executable_paths(&self) -> String {
        let mut out = String::new();
        for ex in &self.executables {
            let _ = writeln!(out, "{}", ex.filename.display());
        }
        out
    }

    /// Each executable followed by its slots, indented. Lists slots first when needed.
    pub async fn dump_test_slots(&mut self) -> String {
        self.parse_all_slots().await;

        let mut out = String::new();
        for ex in &self.executables {
            let _ = writeln!(out, "{}", ex.filename.display());
            for slot in ex.slots.iter().flatten() {
                let _ = writeln!(out, "    - {}", slot.name);
            }
        }
        out
    }

    /// Executables that have a slot named `slot`. Slots must already be listed.
    pub fn executables_containing_slot(&self, slot: &str) -> Vec<&QtTest> {
        self.executables
            .iter()
            .filter(|ex| ex.slot_by_name(slot).is_some())
            .collect()
    }
}

fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
