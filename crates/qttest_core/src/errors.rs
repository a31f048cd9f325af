//! Errors produced while reading ctest and codemodel JSON.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Errors raised by the core parsers.
///
/// TAP and txt logs are parsed leniently and never fail; only JSON inputs, which come from CMake and are
/// expected to be well formed, can produce an error.
#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    #[error("failed to parse ctest output: {message}")]
    #[diagnostic(
        code(qttest::ctest_json),
        help("run `ctest --show-only=json-v1` in the build directory to inspect the raw output")
    )]
    CtestJson {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("failed to parse CMake codemodel: {0}")]
    #[diagnostic(code(qttest::codemodel_json))]
    CodemodelJson(#[from] serde_json::Error),
}

impl CoreError {
    /// Build a [`CoreError::CtestJson`] that points at the position serde reported.
    pub fn ctest_json(source: &str, err: &serde_json::Error) -> Self {
        let offset = offset_of(source, err.line(), err.column());
        CoreError::CtestJson {
            message: err.to_string(),
            src: NamedSource::new("ctest --show-only=json-v1", source.to_string()),
            span: SourceSpan::from((offset, 0)),
        }
    }
}

/// Convert a 1-based line/column pair into a byte offset clamped to `source`.
fn offset_of(source: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }

    let mut offset = 0;
    for (idx, text) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let col = column.saturating_sub(1).min(text.len());
            return offset + col;
        }
        offset += text.len();
    }
    source.len()
}
