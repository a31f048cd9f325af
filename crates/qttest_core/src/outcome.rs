//! Classify QtTest results into per-slot outcomes.
//!
//! A slot can produce several TAP records: one per data row, one per `QEXPECT_FAIL` that was continued, and a
//! final verdict. [`classify_slots`] folds them into one [`SlotOutcome`] per slot and reports the fixture functions
//! (`initTestCase`, ...) separately.
//!
//! ## Notes
//! - **Precedence**: fatal > fail > unexpected pass > expected failure > skip > pass. An expected failure
//!   followed by a genuine failure in the same slot is therefore a failure; the marker only covers the one
//!   verification it precedes.
//! - **Fatal aborts**: `qFatal` terminates the executable. The slot that aborted is [`SlotOutcome::Fatal`] and
//!   every slot after it is [`SlotOutcome::NotRun`], never a failure of its own.
//! - **Abnormal termination** without a fatal record (a crash) is pinned on the slot that was running: the
//!   owner of the last record when that record did not close its slot, otherwise the next slot.
//! - **Fixture functions** (`initTestCase`, `cleanupTestCase`, `init`, `cleanup`) are not slots. Their failures
//!   are reported separately; a failing `initTestCase` means no slot ran.
//! - **Benchmarks** do not appear here: their timings never influence pass/fail.

use std::collections::HashMap;
use std::fmt;

use crate::paths::{data_tag_from_record, slot_name_from_record};
use crate::tap::{TapAssert, TapDocument};

/// Text QtTest records for a `qFatal` inside a test function.
pub const FATAL_ERROR_MARKER: &str = "Received a fatal error";
/// Text QtTest puts in the TODO directive of an XPASS record.
pub const XPASS_MARKER: &str = "returned TRUE unexpectedly";
/// Message used when the process died without leaving a fatal record.
pub const ABNORMAL_TERMINATION_MSG: &str = "test process terminated abnormally";

/// Slots QtTest runs around every test function. They are not listed by `-functions`.
pub const FIXTURE_SLOTS: &[&str] = &["initTestCase", "cleanupTestCase", "init", "cleanup"];

/// Where and why a slot failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    /// Slot name (without parentheses or data tag)
    pub name: String,
    /// Source file of the failing check. XPASS records carry no location.
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub message: Option<String>,
}

impl TestFailure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_path: None,
            line_number: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn from_assert(name: &str, assert: &TapAssert) -> Self {
        let diag = assert.diagnostic.as_ref();
        Self {
            name: name.to_string(),
            file_path: diag.and_then(|d| d.file.clone()),
            line_number: diag.and_then(|d| d.line),
            message: diag.and_then(|d| d.message.clone()).or_else(|| assert.todo().map(str::to_string)),
        }
    }

    /// `file:line`, or `None` if the record had no location.
    pub fn location(&self) -> Option<String> {
        let file = self.file_path.as_deref()?;
        Some(match self.line_number {
            Some(line) => format!("{file}:{line}"),
            None => file.to_string(),
        })
    }
}

/// Classification of a single TAP record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incident {
    Pass,
    Fail,
    Fatal,
    ExpectedFail,
    UnexpectedPass,
    Skip,
}

impl Incident {
    /// Classify one assert record.
    pub fn from_assert(assert: &TapAssert) -> Self {
        if let Some(todo) = assert.todo() {
            if !assert.ok {
                return Incident::ExpectedFail;
            }
            if todo.contains(XPASS_MARKER) {
                return Incident::UnexpectedPass;
            }
        }

        if assert.ok {
            return if assert.skip().is_some() {
                Incident::Skip
            } else {
                Incident::Pass
            };
        }

        if is_fatal(assert) {
            Incident::Fatal
        } else {
            Incident::Fail
        }
    }

    fn rank(self) -> u8 {
        match self {
            Incident::Fatal => 5,
            Incident::Fail => 4,
            Incident::UnexpectedPass => 3,
            Incident::ExpectedFail => 2,
            Incident::Skip => 1,
            Incident::Pass => 0,
        }
    }
}

fn is_fatal(assert: &TapAssert) -> bool {
    assert.diagnostic.as_ref().is_some_and(|d| {
        d.message.as_deref().is_some_and(|m| m.contains(FATAL_ERROR_MARKER)) || d.raw.contains(FATAL_ERROR_MARKER)
    })
}

/// The aggregated result of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Passed,
    Failed(TestFailure),
    /// Aborted the executable (`qFatal`, crash)
    Fatal(TestFailure),
    /// Failed under a `QEXPECT_FAIL` marker
    ExpectedFailure { reason: String },
    /// Passed despite a `QEXPECT_FAIL` marker; the marker is stale
    UnexpectedPass(TestFailure),
    Skipped { reason: String },
    /// Never executed, because an earlier slot aborted the run or the slot was not selected
    NotRun,
}

impl SlotOutcome {
    /// Whether this outcome should turn the run red.
    pub fn is_failure(&self) -> bool {
        matches!(self, SlotOutcome::Failed(_) | SlotOutcome::Fatal(_) | SlotOutcome::UnexpectedPass(_))
    }

    /// The failure record, for outcomes that carry one.
    pub fn failure(&self) -> Option<&TestFailure> {
        match self {
            SlotOutcome::Failed(f) | SlotOutcome::Fatal(f) | SlotOutcome::UnexpectedPass(f) => Some(f),
            _ => None,
        }
    }

    /// Short status label used by reporters.
    pub fn label(&self) -> &'static str {
        match self {
            SlotOutcome::Passed => "PASSED",
            SlotOutcome::Failed(_) => "FAILED",
            SlotOutcome::Fatal(_) => "FATAL",
            SlotOutcome::ExpectedFailure { .. } => "XFAIL",
            SlotOutcome::UnexpectedPass(_) => "XPASS",
            SlotOutcome::Skipped { .. } => "SKIPPED",
            SlotOutcome::NotRun => "NOT RUN",
        }
    }
}

impl fmt::Display for SlotOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotOutcome::ExpectedFailure { reason } | SlotOutcome::Skipped { reason } if !reason.is_empty() => {
                write!(f, "{} ({})", self.label(), reason)
            }
            _ => f.write_str(self.label()),
        }
    }
}

/// Fold the records of one slot into its outcome.
fn aggregate(name: &str, records: &[&TapAssert]) -> SlotOutcome {
    let incidents: Vec<(Incident, &TapAssert)> = records.iter().map(|r| (Incident::from_assert(r), *r)).collect();
    let Some(worst) = incidents.iter().map(|(incident, _)| incident.rank()).max() else {
        return SlotOutcome::NotRun;
    };
    // First record of the worst kind carries the location to report
    let Some(&(incident, record)) = incidents.iter().find(|(incident, _)| incident.rank() == worst) else {
        return SlotOutcome::NotRun;
    };

    match incident {
        Incident::Fatal => SlotOutcome::Fatal(TestFailure::from_assert(name, record)),
        Incident::Fail => SlotOutcome::Failed(TestFailure::from_assert(name, record)),
        Incident::UnexpectedPass => SlotOutcome::UnexpectedPass(TestFailure::from_assert(name, record)),
        Incident::ExpectedFail => SlotOutcome::ExpectedFailure {
            reason: record.todo().unwrap_or_default().to_string(),
        },
        Incident::Skip => SlotOutcome::Skipped {
            reason: record.skip().unwrap_or_default().to_string(),
        },
        Incident::Pass => SlotOutcome::Passed,
    }
}

/// Outcomes of one run of an executable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// One outcome per requested slot, in order
    pub outcomes: Vec<(String, SlotOutcome)>,
    /// A failure outside the test functions: `initTestCase`, `cleanupTestCase`, `init`, `cleanup`, or a crash
    /// after the last slot finished. Its [`TestFailure::name`] is the fixture function.
    pub fixture_failure: Option<SlotOutcome>,
}

/// Where the process was when it died.
#[derive(Debug, PartialEq, Eq)]
enum AbortSite {
    /// Index into the requested slots
    Slot(usize),
    /// A fixture function, or teardown after the last slot
    Fixture(String),
}

/// Whether `record` closes its slot.
///
/// Continued `QEXPECT_FAIL` incidents and data rows are followed by more records of the same slot; anything
/// else is the slot's last word.
fn is_verdict(record: &TapAssert) -> bool {
    data_tag_from_record(&record.name).is_none() && Incident::from_assert(record) != Incident::ExpectedFail
}

/// Classify a run: every slot in `slots`, plus failures of the fixture functions around them.
///
/// `aborted` is true when the process was terminated by a signal (or otherwise did not exit normally). When
/// that happens without a fatal record, the slot that owns the last record is blamed if that record did not
/// close it, otherwise the slot after it.
#[tracing::instrument(skip_all, fields(slot_count = slots.len(), aborted = aborted))]
pub fn classify_slots<S: AsRef<str>>(tap: &TapDocument, slots: &[S], aborted: bool) -> Classification {
    let mut records: HashMap<String, Vec<&TapAssert>> = HashMap::new();
    let mut fixtures: Vec<(String, Vec<&TapAssert>)> = Vec::new();
    let mut last: Option<(String, &TapAssert)> = None;

    for assert in tap.asserts() {
        let name = slot_name_from_record(&assert.name);
        last = Some((name.clone(), assert));
        if FIXTURE_SLOTS.contains(&name.as_str()) {
            match fixtures.iter_mut().find(|(fixture, _)| *fixture == name) {
                Some((_, list)) => list.push(assert),
                None => fixtures.push((name, vec![assert])),
            }
            continue;
        }
        records.entry(name).or_default().push(assert);
    }

    for name in records.keys() {
        if !slots.iter().any(|s| s.as_ref() == name) {
            tracing::warn!(slot = %name, "TAP record for a slot that was not listed");
        }
    }

    let fixture_outcomes: Vec<(String, SlotOutcome)> = fixtures
        .iter()
        .map(|(name, list)| (name.clone(), aggregate(name, list)))
        .collect();
    let mut fixture_failure = fixture_outcomes
        .iter()
        .map(|(_, outcome)| outcome)
        .find(|outcome| outcome.is_failure())
        .cloned();

    // QtTest runs no test function once initTestCase failed
    let setup_failed = fixture_outcomes
        .iter()
        .any(|(name, outcome)| name == "initTestCase" && outcome.is_failure());
    if setup_failed {
        let outcomes = slots.iter().map(|s| (s.as_ref().to_string(), SlotOutcome::NotRun)).collect();
        return Classification {
            outcomes,
            fixture_failure,
        };
    }

    let mut terminated = false;
    let mut outcomes = Vec::with_capacity(slots.len());
    for slot in slots {
        let name = slot.as_ref();
        let outcome = match records.get(name) {
            Some(slot_records) if !terminated => aggregate(name, slot_records),
            _ => SlotOutcome::NotRun,
        };
        terminated |= matches!(outcome, SlotOutcome::Fatal(_));
        outcomes.push((name.to_string(), outcome));
    }

    let fatal_recorded = terminated || matches!(fixture_failure, Some(SlotOutcome::Fatal(_)));
    if (aborted || tap.bailed_out()) && !fatal_recorded {
        let last = last.as_ref().map(|(name, record)| (name.as_str(), *record));
        match abort_site(slots, &records, last, tap.is_complete()) {
            AbortSite::Slot(idx) => {
                for (position, (name, outcome)) in outcomes.iter_mut().enumerate().skip(idx) {
                    *outcome = if position == idx {
                        SlotOutcome::Fatal(TestFailure::new(name.as_str()).with_message(ABNORMAL_TERMINATION_MSG))
                    } else {
                        SlotOutcome::NotRun
                    };
                }
            }
            AbortSite::Fixture(name) => {
                tracing::debug!(fixture = %name, "process died outside the test functions");
                if name == "initTestCase" {
                    for (_, outcome) in &mut outcomes {
                        *outcome = SlotOutcome::NotRun;
                    }
                }
                let failure = TestFailure::new(name).with_message(ABNORMAL_TERMINATION_MSG);
                fixture_failure = Some(SlotOutcome::Fatal(failure));
            }
        }
    }

    Classification {
        outcomes,
        fixture_failure,
    }
}

/// Find what was running when the process died, from the last record it wrote.
fn abort_site<S: AsRef<str>>(
    slots: &[S],
    records: &HashMap<String, Vec<&TapAssert>>,
    last: Option<(&str, &TapAssert)>,
    complete: bool,
) -> AbortSite {
    let Some((owner, record)) = last else {
        return if slots.is_empty() {
            AbortSite::Fixture("initTestCase".to_string())
        } else {
            AbortSite::Slot(0)
        };
    };
    // The plan is written after cleanupTestCase: every function had finished
    if complete {
        return AbortSite::Fixture(owner.to_string());
    }

    if let Some(idx) = slots.iter().position(|s| s.as_ref() == owner) {
        if !is_verdict(record) {
            return AbortSite::Slot(idx);
        }
        return if idx + 1 < slots.len() {
            AbortSite::Slot(idx + 1)
        } else {
            AbortSite::Fixture("cleanupTestCase".to_string())
        };
    }

    match owner {
        "initTestCase" if is_verdict(record) && !slots.is_empty() => AbortSite::Slot(0),
        "initTestCase" | "cleanupTestCase" | "init" | "cleanup" => AbortSite::Fixture(owner.to_string()),
        // A slot outside the requested ones, e.g. a stale slot list
        _ => match slots.iter().position(|s| !records.contains_key(s.as_ref())) {
            Some(idx) => AbortSite::Slot(idx),
            None => AbortSite::Fixture(owner.to_string()),
        },
    }
}

/// Counts of slot outcomes across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub fatal: usize,
    pub xfailed: usize,
    pub xpassed: usize,
    pub skipped: usize,
    pub not_run: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &SlotOutcome) {
        match outcome {
            SlotOutcome::Passed => self.passed += 1,
            SlotOutcome::Failed(_) => self.failed += 1,
            SlotOutcome::Fatal(_) => self.fatal += 1,
            SlotOutcome::ExpectedFailure { .. } => self.xfailed += 1,
            SlotOutcome::UnexpectedPass(_) => self.xpassed += 1,
            SlotOutcome::Skipped { .. } => self.skipped += 1,
            SlotOutcome::NotRun => self.not_run += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.fatal + self.xfailed + self.xpassed + self.skipped + self.not_run
    }

    /// No failures, no fatal aborts, no unexpected passes.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.fatal == 0 && self.xpassed == 0
    }

    /// Comma separated non-zero counters, e.g. `3 passed, 1 failed`.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            (self.passed, "passed"),
            (self.failed, "failed"),
            (self.fatal, "fatal"),
            (self.skipped, "skipped"),
            (self.xfailed, "xfailed"),
            (self.xpassed, "xpassed"),
            (self.not_run, "not run"),
        ]
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect();

        if parts.is_empty() {
            "no slots".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl std::ops::AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.fatal += other.fatal;
        self.xfailed += other.xfailed;
        self.xpassed += other.xpassed;
        self.skipped += other.skipped;
        self.not_run += other.not_run;
    }
}

impl<'a> FromIterator<&'a SlotOutcome> for RunSummary {
    fn from_iter<I: IntoIterator<Item = &'a SlotOutcome>>(iter: I) -> Self {
        let mut summary = RunSummary::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}
