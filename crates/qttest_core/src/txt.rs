//! Read the plain-text log QtTest writes with `-o <file>,txt`.
//!
//! Only two things are extracted: `QBENCHMARK` results and the final `Totals:` line. Pass/fail
//! classification comes from the TAP log (see [`crate::outcome`]).

/// One `RESULT :` entry of a benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub slot: String,
    /// Data tag, for data-driven benchmarks
    pub tag: Option<String>,
    pub value: f64,
    /// `msecs`, `CPU ticks`, `instructions read`, ...
    pub unit: String,
    pub total: f64,
    pub iterations: u64,
}

/// Counters from the `Totals:` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub blacklisted: u32,
    pub duration_ms: u64,
}

impl std::fmt::Display for Totals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped, {} blacklisted, {}ms",
            self.passed, self.failed, self.skipped, self.blacklisted, self.duration_ms
        )
    }
}

/// Extract all benchmark results, in order.
///
/// ```text
/// RESULT : MyTest::testA():
///      0.000012 msecs per iteration (total: 51, iterations: 4194304)
/// ```
pub fn parse_benchmarks(txt: &str) -> Vec<BenchmarkResult> {
    let mut results = Vec::new();
    let mut lines = txt.lines();

    while let Some(line) = lines.next() {
        let Some(header) = line.trim().strip_prefix("RESULT :") else {
            continue;
        };
        let Some((slot, tag)) = parse_result_header(header.trim()) else {
            continue;
        };

        let Some(measurement) = lines.by_ref().map(str::trim).find(|l| !l.is_empty()) else {
            break;
        };
        match parse_measurement(measurement) {
            Some((value, unit, total, iterations)) => results.push(BenchmarkResult {
                slot,
                tag,
                value,
                unit,
                total,
                iterations,
            }),
            None => tracing::debug!(line = measurement, "unrecognised benchmark measurement"),
        }
    }

    results
}

/// `MyTest::testA():` or `MyTest::testA():"row":` -> (`testA`, tag)
fn parse_result_header(header: &str) -> Option<(String, Option<String>)> {
    let header = header.strip_suffix(':').unwrap_or(header);
    let (function, rest) = header.split_once("()")?;
    let slot = function.rsplit("::").next()?.trim().to_string();
    if slot.is_empty() {
        return None;
    }

    let tag = rest
        .trim_start_matches(':')
        .trim()
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .map(str::to_string);
    Some((slot, tag))
}

/// `0.000012 msecs per iteration (total: 51, iterations: 4194304)`
fn parse_measurement(line: &str) -> Option<(f64, String, f64, u64)> {
    let (head, tail) = line.split_once(" per iteration")?;
    let (value, unit) = head.trim().split_once(char::is_whitespace)?;
    let value = value.parse().ok()?;

    let inner = tail.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut total = None;
    let mut iterations = None;
    for part in inner.split(',') {
        let (key, val) = part.split_once(':')?;
        match key.trim() {
            "total" => total = val.trim().parse::<f64>().ok(),
            "iterations" => iterations = val.trim().parse::<u64>().ok(),
            _ => {}
        }
    }

    Some((value, unit.trim().to_string(), total?, iterations?))
}

/// Parse `Totals: 3 passed, 1 failed, 0 skipped, 0 blacklisted, 5ms`.
pub fn parse_totals(txt: &str) -> Option<Totals> {
    let line = txt.lines().rev().find_map(|l| l.trim().strip_prefix("Totals:"))?;
    let mut totals = Totals::default();
    for part in line.split(',') {
        let part = part.trim();
        if let Some(ms) = part.strip_suffix("ms") {
            totals.duration_ms = ms.trim().parse().ok()?;
            continue;
        }
        let (count, label) = part.split_once(' ')?;
        let count = count.parse().ok()?;
        match label.trim() {
            "passed" => totals.passed = count,
            "failed" => totals.failed = count,
            "skipped" => totals.skipped = count,
            "blacklisted" => totals.blacklisted = count,
            _ => {}
        }
    }
    Some(totals)
}
