use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

/// What went wrong while turning a template into a program.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// A chained opener appeared after a block it may not follow.
    Structural { tag: String, after: String },
    /// Input ended while a block was still open.
    Unterminated { tag: String, expected: String },
    /// A line could not be compiled: unbalanced splice delimiter or an
    /// embedded expression/statement that does not parse.
    Generation,
}

/// Parse errors with source location information.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 1-based line number of the offending logical line.
    pub line: usize,
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn structural(
        tag: &str,
        after: &str,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind: ParseErrorKind::Structural {
                tag: tag.to_string(),
                after: after.to_string(),
            },
            message: format!("unexpected \"{}\" after \"{}\"", tag, after),
            line,
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn unterminated(
        tag: &str,
        expected: &str,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind: ParseErrorKind::Unterminated {
                tag: tag.to_string(),
                expected: expected.to_string(),
            },
            message: format!("expected \"{}\" to close \"{}\"", expected, tag),
            line,
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn generation(
        message: impl Into<String>,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind: ParseErrorKind::Generation,
            message: message.into(),
            line,
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(Severity::Error)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}
