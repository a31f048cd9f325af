//! Read the TAP stream QtTest writes with `-o <file>,tap`.
//!
//! QtTest emits TAP version 13: one `ok`/`not ok` line per incident, optionally followed by an indented YAML
//! block (`---` ... `...`) carrying the failure type, message and location.
//!
//! ## Notes
//! - **Lenient by construction**: a run killed by `qFatal` or a crash leaves a truncated file. Whatever was
//!   written is still returned, and an unterminated YAML block simply ends at end of input.
//! - **YAML is best effort**: QtTest does not quote messages such as `'false' returned FALSE. ()`, which is
//!   not valid YAML. When `serde_yaml` rejects a block, its top-level `key: value` lines are scanned instead.

use serde_yaml::Value;

/// A `# TODO` or `# SKIP` directive attached to an assert line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapDirective {
    Todo(String),
    Skip(String),
}

/// The YAML diagnostic block following an assert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapDiagnostic {
    /// QtTest incident type (`QFAIL`, `QVERIFY`, `QCOMPARE`, ...)
    pub kind: Option<String>,
    pub message: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// The dedented block text, kept for fields this reader does not model
    pub raw: String,
}

/// One `ok` / `not ok` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapAssert {
    pub ok: bool,
    pub number: Option<u32>,
    /// Description as written, e.g. `testA()` or `testA(row 1)`
    pub name: String,
    pub directive: Option<TapDirective>,
    pub diagnostic: Option<TapDiagnostic>,
}

/// A single parsed TAP line (diagnostic blocks are folded into their assert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapEvent {
    Version(u32),
    Plan { start: u32, end: u32 },
    Assert(TapAssert),
    Comment(String),
    BailOut(String),
    Extra(String),
}

/// A parsed TAP stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapDocument {
    pub events: Vec<TapEvent>,
}

impl TapDocument {
    /// Parse `input`. Never fails; unknown lines become [`TapEvent::Extra`].
    pub fn parse(input: &str) -> Self {
        let mut events: Vec<TapEvent> = Vec::new();
        let mut lines = input.lines();

        while let Some(line) = lines.next() {
            if line.trim() == "---" {
                let indent = leading_whitespace(line);
                let mut block = Vec::new();
                for next in lines.by_ref() {
                    if next.trim() == "..." {
                        break;
                    }
                    block.push(dedent(next, indent));
                }

                let diagnostic = TapDiagnostic::parse(&block.join("\n"));
                match events.last_mut() {
                    Some(TapEvent::Assert(assert)) if assert.diagnostic.is_none() => {
                        assert.diagnostic = Some(diagnostic);
                    }
                    _ => tracing::debug!("dropping YAML block without a preceding assert"),
                }
                continue;
            }

            events.push(parse_line(line));
        }

        TapDocument { events }
    }

    /// Iterate over all assert records in order.
    pub fn asserts(&self) -> impl Iterator<Item = &TapAssert> {
        self.events.iter().filter_map(|event| match event {
            TapEvent::Assert(assert) => Some(assert),
            _ => None,
        })
    }

    /// The `start..end` plan, if one was written.
    pub fn plan(&self) -> Option<(u32, u32)> {
        self.events.iter().find_map(|event| match event {
            TapEvent::Plan { start, end } => Some((*start, *end)),
            _ => None,
        })
    }

    /// Whether the stream carries a plan and as many asserts as it announced.
    ///
    /// QtTest writes the plan last, so a missing plan usually means the process died mid-run.
    pub fn is_complete(&self) -> bool {
        match self.plan() {
            Some((start, end)) => {
                let expected = end.saturating_sub(start).saturating_add(1);
                end == 0 || self.asserts().count() as u32 >= expected
            }
            None => false,
        }
    }

    /// Whether the producer bailed out.
    pub fn bailed_out(&self) -> bool {
        self.events.iter().any(|e| matches!(e, TapEvent::BailOut(_)))
    }
}

impl TapAssert {
    /// The `# TODO` text, if any.
    pub fn todo(&self) -> Option<&str> {
        match &self.directive {
            Some(TapDirective::Todo(reason)) => Some(reason),
            _ => None,
        }
    }

    /// The `# SKIP` text, if any.
    pub fn skip(&self) -> Option<&str> {
        match &self.directive {
            Some(TapDirective::Skip(reason)) => Some(reason),
            _ => None,
        }
    }
}

impl TapDiagnostic {
    /// Parse a dedented YAML block.
    pub fn parse(block: &str) -> Self {
        let mut diagnostic = match serde_yaml::from_str::<Value>(block) {
            Ok(Value::Mapping(map)) => TapDiagnostic {
                kind: map.get("type").and_then(scalar_to_string),
                message: map.get("message").and_then(scalar_to_string),
                file: map.get("file").and_then(scalar_to_string),
                line: map.get("line").and_then(scalar_to_u32),
                raw: String::new(),
            },
            _ => Self::scan_top_level(block),
        };
        diagnostic.raw = block.to_string();
        diagnostic
    }

    fn scan_top_level(block: &str) -> Self {
        let mut diagnostic = TapDiagnostic::default();
        for line in block.lines() {
            if line.starts_with(char::is_whitespace) {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = unquote(value.trim());
            match key.trim() {
                "type" => diagnostic.kind = Some(value.to_string()),
                "message" => diagnostic.message = Some(value.to_string()),
                "file" => diagnostic.file = Some(value.to_string()),
                "line" => diagnostic.line = value.parse().ok(),
                _ => {}
            }
        }
        diagnostic
    }
}

fn parse_line(line: &str) -> TapEvent {
    let trimmed = line.trim();

    if let Some(version) = trimmed.strip_prefix("TAP version ") {
        if let Ok(version) = version.trim().parse() {
            return TapEvent::Version(version);
        }
    }

    if let Some(plan) = parse_plan(trimmed) {
        return plan;
    }

    if let Some(rest) = strip_keyword(trimmed, "not ok") {
        return TapEvent::Assert(parse_assert(false, rest));
    }
    if let Some(rest) = strip_keyword(trimmed, "ok") {
        return TapEvent::Assert(parse_assert(true, rest));
    }

    if let Some(reason) = trimmed.strip_prefix("Bail out!") {
        return TapEvent::BailOut(reason.trim().to_string());
    }

    if let Some(comment) = trimmed.strip_prefix('#') {
        return TapEvent::Comment(comment.trim().to_string());
    }

    TapEvent::Extra(line.to_string())
}

/// `1..N` with an optional trailing `# comment`.
fn parse_plan(line: &str) -> Option<TapEvent> {
    let body = line.split('#').next().unwrap_or(line).trim();
    let (start, end) = body.split_once("..")?;
    let start = start.parse().ok()?;
    let end = end.parse().ok()?;
    Some(TapEvent::Plan { start, end })
}

/// Strip `keyword` when it is followed by whitespace or the end of the line.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn parse_assert(ok: bool, rest: &str) -> TapAssert {
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    let number = rest[..digits].parse().ok();
    let rest = rest[digits..].trim_start();
    let rest = rest.strip_prefix('-').map(str::trim_start).unwrap_or(rest);

    let (name, directive) = split_directive(rest);

    TapAssert {
        ok,
        number,
        name: name.trim().to_string(),
        directive,
        diagnostic: None,
    }
}

/// Split `description # TODO reason` into its parts. `\#` does not start a directive.
fn split_directive(text: &str) -> (&str, Option<TapDirective>) {
    let bytes = text.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        if b != b'#' || (idx > 0 && bytes[idx - 1] == b'\\') {
            continue;
        }
        let after = text[idx + 1..].trim_start();
        let upper: String = after.chars().take(4).collect::<String>().to_ascii_uppercase();
        let reason = || after.get(4..).unwrap_or("").trim().to_string();
        match upper.as_str() {
            "TODO" => return (&text[..idx], Some(TapDirective::Todo(reason()))),
            "SKIP" => return (&text[..idx], Some(TapDirective::Skip(reason()))),
            _ => {}
        }
    }
    (text, None)
}

fn leading_whitespace(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Strip at most `indent` bytes of leading whitespace, never splitting a character.
fn dedent(line: &str, indent: usize) -> &str {
    for (idx, ch) in line.char_indices() {
        if idx >= indent || !ch.is_whitespace() {
            return &line[idx..];
        }
    }
    ""
}

fn unquote(value: &str) -> &str {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"')) || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted { &value[1..value.len() - 1] } else { value }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
