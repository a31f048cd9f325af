//! Run reporting (pytest-style)
//!
//! ## TestReporter Trait
//!
//! Running is separated from reporting through the `TestReporter` trait, so other output formats (JSON,
//! JUnit, ...) only need another implementation.

use std::io::{self, Write};
use std::time::Duration;

use qttest_core::outcome::{RunSummary, SlotOutcome};

use crate::error::QtTestError;
use crate::qttest::{QtTest, RunReport};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

/// Trait for reporting the progress of a run.
pub trait TestReporter {
    /// Called once the executables to run are known
    fn on_collection_complete(&mut self, executable_count: usize, slot_count: usize);

    /// Called before an executable starts
    fn on_executable_start(&mut self, _test: &QtTest) {}

    /// Called for every slot outcome of a finished executable, in slot order
    fn on_slot_complete(&mut self, test: &QtTest, slot: &str, outcome: &SlotOutcome);

    /// Called after the slot outcomes of an executable were reported
    fn on_executable_complete(&mut self, test: &QtTest, report: &RunReport);

    /// Called when an executable could not be run at all
    fn on_executable_error(&mut self, test: &QtTest, error: &QtTestError);

    /// Called when all executables have completed
    fn on_run_complete(&mut self, summary: &TestSummary);
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub executables: usize,
    /// Executables that exited unsuccessfully, failed a fixture function or couldn't be started
    pub failed_executables: usize,
    pub slots: RunSummary,
    pub duration: Duration,
}

impl TestSummary {
    pub fn record(&mut self, report: &RunReport) {
        self.executables += 1;
        if !report.success || report.fixture_failure.is_some() {
            self.failed_executables += 1;
        }
        self.slots += report.summary();
    }

    pub fn record_error(&mut self) {
        self.executables += 1;
        self.failed_executables += 1;
    }

    pub fn is_success(&self) -> bool {
        self.failed_executables == 0 && self.slots.is_success()
    }
}

/// A failure kept for the FAILURES section
struct FailureEntry {
    title: String,
    lines: Vec<String>,
}

/// Message and location of a failing outcome.
fn failure_lines(outcome: &SlotOutcome) -> Vec<String> {
    let Some(failure) = outcome.failure() else {
        return Vec::new();
    };
    let mut lines = vec![format!(
        "{}: {}",
        outcome.label(),
        failure.message.as_deref().unwrap_or("(no message)")
    )];
    if let Some(location) = failure.location() {
        lines.push(location);
    }
    lines
}

/// Default console reporter (pytest-style)
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
    pub verbose: bool,
    /// Emit ANSI colors
    pub color: bool,
    failures: Vec<FailureEntry>,
}

impl ConsoleReporter<io::Stdout> {
    pub fn new(verbose: bool) -> Self {
        use std::io::IsTerminal;
        let color = io::stdout().is_terminal();
        Self::with_writer(io::stdout(), verbose, color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn with_writer(out: W, verbose: bool, color: bool) -> Self {
        Self {
            out,
            verbose,
            color,
            failures: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, style: &str, text: &str) -> String {
        if self.color {
            format!("{style}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn styled_outcome(&self, outcome: &SlotOutcome) -> String {
        let style = match outcome {
            SlotOutcome::Passed => GREEN,
            SlotOutcome::Failed(_) | SlotOutcome::Fatal(_) | SlotOutcome::UnexpectedPass(_) => RED,
            SlotOutcome::ExpectedFailure { .. } | SlotOutcome::Skipped { .. } | SlotOutcome::NotRun => YELLOW,
        };
        self.paint(style, &outcome.to_string())
    }

    fn progress_char(outcome: &SlotOutcome) -> char {
        match outcome {
            SlotOutcome::Passed => '.',
            SlotOutcome::Failed(_) => 'F',
            SlotOutcome::Fatal(_) => 'E',
            SlotOutcome::ExpectedFailure { .. } => 'x',
            SlotOutcome::UnexpectedPass(_) => 'X',
            SlotOutcome::Skipped { .. } => 's',
            SlotOutcome::NotRun => '-',
        }
    }

    // Console output is best effort: a closed stdout must not abort the run
    fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
    }

    fn emitln(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }
}

impl<W: Write> TestReporter for ConsoleReporter<W> {
    fn on_collection_complete(&mut self, executable_count: usize, slot_count: usize) {
        let banner = self.paint(BOLD, "=================== test session starts ===================");
        self.emitln(&banner);
        self.emitln(&format!(
            "collected {executable_count} executable(s), {slot_count} slot(s)"
        ));
        self.emitln("");
    }

    fn on_executable_start(&mut self, test: &QtTest) {
        if !self.verbose {
            self.emit(&format!("{} ", test.label()));
        }
    }

    fn on_slot_complete(&mut self, test: &QtTest, slot: &str, outcome: &SlotOutcome) {
        if self.verbose {
            let status = self.styled_outcome(outcome);
            self.emitln(&format!("{}::{} {}", test.label(), slot, status));
        } else {
            let mark = Self::progress_char(outcome).to_string();
            let mark = if outcome.is_failure() { self.paint(RED, &mark) } else { mark };
            self.emit(&mark);
        }

        if outcome.failure().is_some() {
            self.failures.push(FailureEntry {
                title: format!("{}::{}", test.label(), slot),
                lines: failure_lines(outcome),
            });
        }
    }

    fn on_executable_complete(&mut self, test: &QtTest, report: &RunReport) {
        if !self.verbose {
            self.emitln("");
        }

        if let Some(outcome) = &report.fixture_failure {
            let name = outcome.failure().map_or("fixture", |f| f.name.as_str());
            if self.verbose {
                let status = self.styled_outcome(outcome);
                self.emitln(&format!("{}::{} {}", test.label(), name, status));
            }
            self.failures.push(FailureEntry {
                title: format!("{}::{}", test.label(), name),
                lines: failure_lines(outcome),
            });
        }

        // A red exit without a red slot: crash outside any slot, or slots never listed
        let any_slot_failed = report.outcomes.iter().any(|(_, o)| o.is_failure());
        if !report.success && !any_slot_failed && report.fixture_failure.is_none() {
            let reason = if report.aborted {
                "terminated abnormally".to_string()
            } else {
                format!("exited with code {}", report.exit_code)
            };
            if self.verbose {
                let status = self.paint(RED, "FAILED");
                self.emitln(&format!("{} {} ({})", test.label(), status, reason));
            }
            self.failures.push(FailureEntry {
                title: test.label(),
                lines: vec![reason, test.filename.display().to_string()],
            });
        }

        if self.verbose {
            if let Some(totals) = &report.totals {
                self.emitln(&format!("    Totals: {totals}"));
            }
        }

        for bench in &report.benchmarks {
            let tag = bench.tag.as_deref().map(|t| format!(":\"{t}\"")).unwrap_or_default();
            self.emitln(&format!(
                "    RESULT {}::{}{}: {} {} per iteration ({} iterations)",
                test.label(),
                bench.slot,
                tag,
                bench.value,
                bench.unit,
                bench.iterations
            ));
        }
    }

    fn on_executable_error(&mut self, test: &QtTest, error: &QtTestError) {
        if !self.verbose {
            self.emitln("");
        }
        let status = self.paint(RED, "ERROR");
        self.emitln(&format!("{} {}", test.label(), status));
        self.failures.push(FailureEntry {
            title: test.label(),
            lines: vec![error.to_string()],
        });
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        if !self.failures.is_empty() {
            self.emitln("");
            let header = self.paint(&format!("{BOLD}{RED}"), "=================== FAILURES ===================");
            self.emitln(&header);
            let failures = std::mem::take(&mut self.failures);
            for failure in &failures {
                self.emitln("");
                let title = self.paint(BOLD, &format!("___________ {} ___________", failure.title));
                self.emitln(&title);
                self.emitln("");
                for line in &failure.lines {
                    self.emitln(&format!("    {line}"));
                }
            }
        }

        let mut parts = vec![summary.slots.describe()];
        if summary.failed_executables > 0 {
            parts.push(format!("{} failed executable(s)", summary.failed_executables));
        }
        let line = format!(
            "=================== {} in {:.2}s ===================",
            parts.join(", "),
            summary.duration.as_secs_f64()
        );
        let style = if summary.is_success() {
            format!("{BOLD}{GREEN}")
        } else {
            format!("{BOLD}{RED}")
        };
        self.emitln("");
        let line = self.paint(&style, &line);
        self.emitln(&line);
    }
}
