//! A single QtTest executable and its slots

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use qttest_core::outcome::{Classification, RunSummary, SlotOutcome, TestFailure, classify_slots};
use qttest_core::paths::{normalize_slashes, relative_path, strip_exe};
use qttest_core::slots::parse_function_list;
use qttest_core::tap::TapDocument;
use qttest_core::txt::{BenchmarkResult, Totals, parse_benchmarks, parse_totals};

use crate::config::RunnerConfig;
use crate::error::{QtTestError, Result};
use crate::process::{self, OutputSink};

/// Substrings of `ldd` output that identify QtTest linkage
const QTTEST_LIBRARIES: &[&str] = &["libQt5Test.so", "libQt6Test.so"];
/// Fragment of QtTest's `-help` usage line
const QTTEST_HELP_MARKER: &str = "[testfunction[:testdata]]";

/// What to execute to run a test or a slot, for callers that launch it themselves (e.g. under a debugger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    pub label: String,
    pub executable_path: PathBuf,
    pub args: Vec<String>,
}

/// A single QtTest slot (test function)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QtTestSlot {
    pub name: String,
    /// The QtTest executable this slot belongs to
    executable: PathBuf,
    /// Set after running
    pub last_outcome: Option<SlotOutcome>,
    /// Set after running, when the slot failed
    pub last_failure: Option<TestFailure>,
}

impl QtTestSlot {
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            last_outcome: None,
            last_failure: None,
        }
    }

    pub fn id(&self) -> String {
        format!("{}{}", self.executable.display(), self.name)
    }

    pub fn absolute_file_path(&self) -> &Path {
        &self.executable
    }

    pub fn command(&self) -> TestCommand {
        TestCommand {
            label: self.name.clone(),
            executable_path: self.executable.clone(),
            args: vec![self.name.clone()],
        }
    }

    fn clear_state(&mut self) {
        self.last_outcome = None;
        self.last_failure = None;
    }
}

/// The result of one run of an executable (or of one of its slots).
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub executable: PathBuf,
    /// The slot that was run, or `None` for a whole-executable run
    pub slot: Option<String>,
    pub exit_code: i32,
    /// Killed by a signal instead of exiting (abort, crash)
    pub aborted: bool,
    pub success: bool,
    /// Per-slot outcomes, in slot order. Empty when the slots were never listed.
    pub outcomes: Vec<(String, SlotOutcome)>,
    /// Failure of `initTestCase`/`cleanupTestCase` or a crash outside the slots
    pub fixture_failure: Option<SlotOutcome>,
    /// Benchmark results from the txt log; they never affect `success`
    pub benchmarks: Vec<BenchmarkResult>,
    /// QtTest's own counters from the txt log, if it got that far
    pub totals: Option<Totals>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        self.outcomes.iter().map(|(_, outcome)| outcome).collect()
    }

    /// A red exit, a failing slot or a failing fixture function.
    pub fn is_failure(&self) -> bool {
        !self.success || self.fixture_failure.is_some() || self.outcomes.iter().any(|(_, o)| o.is_failure())
    }
}

/// A single QtTest executable. Supports listing and running its slots.
pub struct QtTest {
    pub filename: PathBuf,
    pub build_dir: PathBuf,
    /// If true, probes log their raw output
    pub verbose: bool,
    /// The runnable test slots, `None` until listed
    pub slots: Option<Vec<QtTestSlot>>,
    /// Exit code of the last whole-executable run, -1 if it was killed by a signal
    pub last_exit_code: i32,
    /// Receives the output of the test process
    pub output_sink: Option<OutputSink>,
    config: Arc<RunnerConfig>,
}

impl fmt::Debug for QtTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QtTest")
            .field("filename", &self.filename)
            .field("build_dir", &self.build_dir)
            .field("verbose", &self.verbose)
            .field("slots", &self.slots)
            .field("last_exit_code", &self.last_exit_code)
            .field("output_sink", &self.output_sink.is_some())
            .finish()
    }
}

impl QtTest {
    pub fn new(filename: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(filename, build_dir, Arc::new(RunnerConfig::default()))
    }

    pub fn with_config(filename: impl Into<PathBuf>, build_dir: impl Into<PathBuf>, config: Arc<RunnerConfig>) -> Self {
        Self {
            filename: filename.into(),
            build_dir: build_dir.into(),
            verbose: config.verbose,
            slots: None,
            last_exit_code: 0,
            output_sink: None,
            config,
        }
    }

    pub fn id(&self) -> &Path {
        &self.filename
    }

    pub fn label(&self) -> String {
        self.filename
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path relative to the current directory (`../` when outside it), without `.exe` and with forward slashes.
    ///
    /// Falls back to the filename as given when no relative path exists, e.g. on another drive.
    pub fn relative_filename(&self) -> String {
        let relative = std::env::current_dir()
            .ok()
            .and_then(|cwd| relative_path(&self.filename, &cwd))
            .unwrap_or_else(|| self.filename.clone());
        normalize_slashes(strip_exe(&relative.to_string_lossy()))
    }

    /// The filename without `.exe`.
    pub fn filename_without_extension(&self) -> String {
        strip_exe(&self.filename.to_string_lossy()).to_string()
    }

    /// Runs `<test> -functions` and stores the result in [`QtTest::slots`].
    ///
    /// The previous slot list is kept when the executable reports no slots.
    pub async fn parse_available_slots(&mut self) -> Result<()> {
        let names = list_slots(self.filename.clone(), self.build_dir.clone()).await?;
        self.set_slot_names(names);
        Ok(())
    }

    pub(crate) fn set_slot_names(&mut self, names: Vec<String>) {
        if names.is_empty() {
            return;
        }
        self.slots = Some(
            names
                .into_iter()
                .map(|name| QtTestSlot::new(name, self.filename.clone()))
                .collect(),
        );
    }

    /// Returns whether this executable links to libQtTest.so.
    ///
    /// Useful for Qt autodetection, as some tests are doctest or so. Only implemented for Linux; returns
    /// `None` elsewhere.
    pub async fn links_to_qt_test_lib(&self) -> Result<Option<bool>> {
        if !cfg!(target_os = "linux") {
            return Ok(None);
        }
        probe_links(self.config.ldd_program.clone(), self.filename.clone(), self.verbose)
            .await
            .map(Some)
    }

    /// Returns whether this is a QtTest by running it with `-help` and looking for QtTest's usage line.
    ///
    /// If the executable is not a QtTest it may ignore `-help` and run its tests instead.
    pub async fn is_qt_test_via_help(&self) -> bool {
        probe_help(self.filename.clone(), self.build_dir.clone()).await
    }

    pub fn slot_by_name(&self, name: &str) -> Option<&QtTestSlot> {
        self.slots.as_ref()?.iter().find(|slot| slot.name == name)
    }

    pub fn slot_by_name_mut(&mut self, name: &str) -> Option<&mut QtTestSlot> {
        self.slots.as_mut()?.iter_mut().find(|slot| slot.name == name)
    }

    /// The TAP log name; TAP is plain text and carries failure locations.
    pub fn tap_output_file_name(&self, slot: Option<&str>) -> String {
        self.log_file_name(slot, "tap")
    }

    pub fn txt_output_file_name(&self, slot: Option<&str>) -> String {
        self.log_file_name(slot, "txt")
    }

    fn log_file_name(&self, slot: Option<&str>, extension: &str) -> String {
        match slot {
            Some(slot) => format!("{}_{}.{}", self.label(), slot, extension),
            None => format!("{}.{}", self.label(), extension),
        }
    }

    pub fn command(&self) -> TestCommand {
        TestCommand {
            label: self.label(),
            executable_path: self.filename.clone(),
            args: Vec::new(),
        }
    }

    pub fn clear_sub_test_states(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.clear_state();
        }
    }

    /// Runs a single slot. See [`QtTest::run_test`].
    pub async fn run_slot(&mut self, slot: &str) -> Result<RunReport> {
        self.run_test(Some(slot), None).await
    }

    /// Runs this test, or only `slot` when given.
    ///
    /// `cwd` defaults to the build directory. Logs go to the configured output dir, or to `cwd`. When the
    /// slots are known, their outcomes are refreshed from the TAP log; a whole-executable run also records
    /// [`QtTest::last_exit_code`].
    #[tracing::instrument(skip_all, fields(test = %self.label(), slot = slot.unwrap_or("*")))]
    pub async fn run_test(&mut self, slot: Option<&str>, cwd: Option<&Path>) -> Result<RunReport> {
        if slot.is_none() {
            self.clear_sub_test_states();
        }

        let cwd_dir = cwd
            .filter(|c| !c.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.build_dir.clone());
        let log_dir = self.config.output_dir.clone().unwrap_or_else(|| cwd_dir.clone());
        let tap_path = log_dir.join(self.tap_output_file_name(slot));
        let txt_path = log_dir.join(self.txt_output_file_name(slot));

        // A stale log would be mistaken for this run's results if the test dies early
        for stale in [&tap_path, &txt_path] {
            if let Err(e) = tokio::fs::remove_file(stale).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %stale.display(), "cannot remove old log: {e}");
                }
            }
        }

        let mut args: Vec<String> = Vec::new();
        if let Some(slot) = slot {
            args.push(slot.to_string());
        }
        args.extend(["-o".to_string(), format!("{},tap", tap_path.display())]);
        args.extend(["-o".to_string(), format!("{},txt", txt_path.display())]);
        if self.config.echo_stdout {
            args.extend(["-o".to_string(), "-,txt".to_string()]);
        }

        tracing::info!(
            "Running {} {} with cwd={}",
            self.filename.display(),
            args.join(" "),
            cwd_dir.display()
        );
        let status = process::run_streaming(&self.filename, &args, Some(&cwd_dir), self.output_sink.clone()).await?;
        let exit_code = process::exit_code(&status);
        let aborted = process::terminated_abnormally(&status);

        if slot.is_none() {
            self.last_exit_code = exit_code;
        }

        let classification = if self.slots.as_ref().is_some_and(|slots| !slots.is_empty()) {
            // Which slots failed, so callers can flag each one individually
            match self.update_sub_test_states(&tap_path, slot, aborted).await {
                Ok(classification) => classification,
                Err(e) => {
                    tracing::warn!("failed to update sub-test states: {e}");
                    Classification::default()
                }
            }
        } else {
            Classification::default()
        };

        let (benchmarks, totals) = match tokio::fs::read_to_string(&txt_path).await {
            Ok(txt) => (parse_benchmarks(&txt), parse_totals(&txt)),
            Err(e) => {
                tracing::debug!(path = %txt_path.display(), "no txt log: {e}");
                (Vec::new(), None)
            }
        };

        let Classification {
            outcomes,
            fixture_failure,
        } = classification;
        if let Some(totals) = totals {
            let summary: RunSummary = outcomes.iter().map(|(_, outcome)| outcome).collect();
            if totals.failed > 0 && summary.is_success() && fixture_failure.is_none() {
                tracing::warn!(
                    failed = totals.failed,
                    "the txt log reports failures that the TAP log does not attribute to any slot"
                );
            }
        }

        Ok(RunReport {
            executable: self.filename.clone(),
            slot: slot.map(str::to_string),
            exit_code,
            aborted,
            success: status.success(),
            outcomes,
            fixture_failure,
            benchmarks,
            totals,
        })
    }

    /// Classify the slots from the TAP log at `tap_path` and store the results on each slot.
    ///
    /// After a single-slot run only that slot is updated.
    pub async fn update_sub_test_states(
        &mut self,
        tap_path: &Path,
        slot: Option<&str>,
        aborted: bool,
    ) -> Result<Classification> {
        let data = match tokio::fs::read_to_string(tap_path).await {
            Ok(data) => data,
            // Died before QtTest opened its log: classify from nothing so the abort is still reported
            Err(e) if aborted => {
                tracing::warn!(path = %tap_path.display(), "no TAP log after abnormal termination: {e}");
                String::new()
            }
            Err(e) => {
                tracing::error!(path = %tap_path.display(), "failed to read log file");
                return Err(QtTestError::Io(e));
            }
        };

        let tap = TapDocument::parse(&data);
        let names: Vec<String> = match slot {
            Some(slot) => vec![slot.to_string()],
            None => self.slots.iter().flatten().map(|s| s.name.clone()).collect(),
        };
        let classification = classify_slots(&tap, &names, aborted);
        if let Some(failure) = classification.fixture_failure.as_ref().and_then(SlotOutcome::failure) {
            tracing::warn!(fixture = %failure.name, "{}", failure.message.as_deref().unwrap_or("failed"));
        }

        for (name, outcome) in &classification.outcomes {
            match self.slot_by_name_mut(name) {
                Some(slot) => {
                    slot.last_failure = outcome.failure().cloned();
                    slot.last_outcome = Some(outcome.clone());
                }
                None => tracing::error!(slot = %name, "failed to find slot with name"),
            }
        }

        Ok(classification)
    }
}

/// Runs `<test> -functions` in `build_dir` and returns the slot names.
pub(crate) async fn list_slots(filename: PathBuf, build_dir: PathBuf) -> Result<Vec<String>> {
    if !filename.exists() {
        return Err(QtTestError::MissingExecutable(filename));
    }

    let output = process::capture(&filename, ["-functions"], Some(&build_dir)).await?;
    if !output.success() {
        return Err(QtTestError::Functions {
            code: output.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }

    Ok(parse_function_list(&output.stdout))
}

/// Runs ldd on `filename` and looks for a QtTest library.
pub(crate) async fn probe_links(ldd: PathBuf, filename: PathBuf, verbose: bool) -> Result<bool> {
    if verbose {
        tracing::info!("qttest: Running ldd on {}", filename.display());
    }

    let output = process::capture(&ldd, [&filename], None).await?;
    if verbose {
        tracing::info!("{}", output.stdout);
    }
    if !output.success() {
        return Err(QtTestError::Ldd(filename));
    }

    Ok(QTTEST_LIBRARIES.iter().any(|lib| output.stdout.contains(lib)))
}

/// Runs `<test> -help` and checks for QtTest's usage line. Any failure counts as "not a QtTest".
pub(crate) async fn probe_help(filename: PathBuf, cwd: PathBuf) -> bool {
    match process::capture(&filename, ["-help"], Some(&cwd)).await {
        Ok(output) => output.success() && output.stdout.contains(QTTEST_HELP_MARKER),
        Err(e) => {
            tracing::debug!(test = %filename.display(), "-help probe failed: {e}");
            false
        }
    }
}
