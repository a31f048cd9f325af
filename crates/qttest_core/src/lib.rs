#![forbid(unsafe_code)]
//! Provide the pure model behind the qttest harness: how QtTest results are classified and how the
//! artifacts around a test run (TAP logs, txt logs, `-functions` listings, ctest JSON, CMake codemodels)
//! are read.
//!
//! ## Notes
//!
//! - This is a “core” crate: **no process spawning** and no global state. The harness crate owns I/O and
//!   feeds the text it collected into these parsers.
//! - The outcome taxonomy mirrors what QtTest itself reports: pass, fail, expected failure (XFAIL),
//!   unexpected pass (XPASS), skip, fatal abort, plus slots that never ran because a fatal abort
//!   terminated the executable.

pub mod codemodel;
pub mod ctest;
pub mod errors;
pub mod outcome;
pub mod paths;
pub mod slots;
pub mod tap;
pub mod txt;

pub use ctest::{CMakeTest, parse_ctest_json};
pub use errors::CoreError;
pub use outcome::{Classification, Incident, RunSummary, SlotOutcome, TestFailure, classify_slots};
pub use tap::{TapAssert, TapDiagnostic, TapDirective, TapDocument, TapEvent};
pub use txt::{BenchmarkResult, Totals};
