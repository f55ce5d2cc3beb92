//! NDJSON stream codec.
//!
//! Decoding accepts newline-delimited objects, a single top-level array, or
//! objects concatenated with no separator at all, in any mix. Decoding never
//! fails as a whole: malformed input produces [`DecodeDiagnostic`]s next to
//! whatever decoded cleanly.

use std::fmt;

use serde::Deserialize;
use serde_json::Deserializer;
use serde_json::value::RawValue;
use tracing::warn;

use ledger_types::{Record, RecordError};

/// What to do after a value fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeRecovery {
    /// Stop at the failure and keep everything decoded before it.
    #[default]
    Halt,
    /// Drop the rest of the line the failed value started on and resume on
    /// the next line.
    SkipLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Malformed,
    NotAnObject,
}

/// A problem found while decoding, located in the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeDiagnostic {
    pub kind: DiagnosticKind,
    /// Byte offset into the decoded text.
    pub offset: usize,
    /// 1-based.
    pub line: usize,
    /// 1-based byte column.
    pub column: usize,
    pub message: String,
}

impl DecodeDiagnostic {
    fn at(text: &str, kind: DiagnosticKind, offset: usize, message: String) -> Self {
        let (line, column) = locate(text, offset);
        Self {
            kind,
            offset,
            line,
            column,
            message,
        }
    }
}

impl fmt::Display for DecodeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            DiagnosticKind::Malformed => "malformed JSON",
            DiagnosticKind::NotAnObject => "skipped value",
        };
        write!(
            f,
            "{what} at byte {} (line {}, column {}): {}",
            self.offset, self.line, self.column, self.message
        )
    }
}

/// One top-level value (or one element of a top-level array).
#[derive(Debug)]
pub struct RawItem {
    /// Byte offset of the value, or of its enclosing array.
    pub offset: usize,
    pub raw: Box<RawValue>,
}

#[derive(Debug)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub diagnostics: Vec<DecodeDiagnostic>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// Split `text` into its top-level JSON values, flattening one array level.
#[must_use]
pub fn decode_stream(text: &str, recovery: DecodeRecovery) -> Decoded<RawItem> {
    let mut decoded = Decoded::default();
    let mut pos = skip_insignificant(text, text.strip_prefix('\u{feff}').map_or(0, |_| 3));

    while pos < text.len() {
        let mut stream = Deserializer::from_str(&text[pos..]).into_iter::<Box<RawValue>>();
        let mut value_start = pos;

        let failure = loop {
            match stream.next() {
                Some(Ok(raw)) => {
                    push_flattened(text, value_start, raw, &mut decoded);
                    value_start = skip_insignificant(text, pos + stream.byte_offset());
                }
                Some(Err(err)) => break Some(err),
                None => break None,
            }
        };

        let Some(err) = failure else {
            break;
        };

        let failed_at = failure_offset(text, pos, &err);
        let diagnostic = DecodeDiagnostic::at(
            text,
            DiagnosticKind::Malformed,
            failed_at,
            parser_message(&err),
        );
        warn!(
            offset = diagnostic.offset,
            line = diagnostic.line,
            "Malformed JSON in ledger input: {}",
            diagnostic.message
        );
        decoded.diagnostics.push(diagnostic);

        match recovery {
            DecodeRecovery::Halt => break,
            DecodeRecovery::SkipLine => {
                pos = skip_insignificant(text, next_line_start(text, value_start));
            }
        }
    }

    decoded
}

/// Decode `text` into records. Values that are not JSON objects are skipped
/// with a diagnostic.
#[must_use]
pub fn decode_records(text: &str, recovery: DecodeRecovery) -> Decoded<Record> {
    let Decoded {
        items,
        mut diagnostics,
    } = decode_stream(text, recovery);

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match Record::from_raw(item.raw) {
            Ok(record) => records.push(record),
            Err(err) => {
                let kind = match err {
                    RecordError::NotAnObject { .. } => DiagnosticKind::NotAnObject,
                    RecordError::Json(_) => DiagnosticKind::Malformed,
                };
                let diagnostic = DecodeDiagnostic::at(text, kind, item.offset, err.to_string());
                warn!(
                    offset = diagnostic.offset,
                    line = diagnostic.line,
                    "Skipping ledger value: {}",
                    diagnostic.message
                );
                diagnostics.push(diagnostic);
            }
        }
    }

    Decoded {
        items: records,
        diagnostics,
    }
}

/// Encode records as NDJSON: one compact object per line, every line
/// (including the last) terminated by `\n`.
pub fn encode_records(records: &[Record]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

fn push_flattened(text: &str, offset: usize, raw: Box<RawValue>, decoded: &mut Decoded<RawItem>) {
    if !raw.get().starts_with('[') {
        decoded.items.push(RawItem { offset, raw });
        return;
    }

    match serde_json::from_str::<Vec<Box<RawValue>>>(raw.get()) {
        Ok(elements) => decoded.items.extend(
            elements
                .into_iter()
                .map(|raw| RawItem { offset, raw }),
        ),
        Err(err) => decoded.diagnostics.push(DecodeDiagnostic::at(
            text,
            DiagnosticKind::Malformed,
            offset,
            parser_message(&err),
        )),
    }
}

fn skip_insignificant(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut pos = from;
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t' | b'\n' | b'\r') {
        pos += 1;
    }
    pos
}

fn next_line_start(text: &str, from: usize) -> usize {
    text.as_bytes()[from..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(text.len(), |nl| from + nl + 1)
}

/// Absolute byte offset of a parser error raised while reading `text[start..]`.
fn failure_offset(text: &str, start: usize, err: &serde_json::Error) -> usize {
    let bytes = &text.as_bytes()[start..];
    let mut line_start = 0;
    for _ in 1..err.line() {
        match bytes[line_start..].iter().position(|b| *b == b'\n') {
            Some(nl) => line_start += nl + 1,
            None => break,
        }
    }
    (start + line_start + err.column().saturating_sub(1)).min(text.len())
}

fn locate(text: &str, offset: usize) -> (usize, usize) {
    let before = &text.as_bytes()[..offset.min(text.len())];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let column = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(before.len(), |nl| before.len() - nl - 1)
        + 1;
    (line, column)
}

/// serde_json's message without its slice-relative "at line N column M" tail.
fn parser_message(err: &serde_json::Error) -> String {
    let full = err.to_string();
    match full.rsplit_once(" at line ") {
        Some((message, _)) => message.to_string(),
        None => full,
    }
}
