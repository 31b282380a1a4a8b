use std::fmt;
use std::ops::Range;

use spool::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    #[error("'{type_name}' has no method '{method}'")]
    UnknownMethod { type_name: String, method: String },

    #[error("{function}() takes {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("sequence of {0} items exceeds the size limit")]
    TooLarge(u128),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("cannot unpack {got} value(s) into {expected} name(s)")]
    Unpack { expected: usize, got: usize },

    #[error("invalid value: {0}")]
    ValueError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse errors in included file '{path}': {}", .messages.join(", "))]
    IncludeParse { path: String, messages: Vec<String> },

    #[error("stack overflow")]
    StackOverflow,

    #[error("{0}")]
    Custom(String),
}

impl RuntimeError {
    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// A runtime error enriched with source location information.
#[derive(Debug)]
pub struct DiagnosticError {
    pub error: RuntimeError,
    /// 1-based line of the instruction that failed.
    pub line: Option<usize>,
    pub span: Option<Range<usize>>,
    /// File that `span` points into. Only meaningful while `span` is set:
    /// errors from included files lose their span before they leave the
    /// include and are re-anchored in the caller's file.
    pub source_id: usize,
    /// Include chain, innermost first.
    pub notes: Vec<String>,
}

impl DiagnosticError {
    /// Attach a location unless one is already present.
    pub fn anchor(mut self, line: usize, span: Range<usize>, source_id: usize) -> Self {
        if self.span.is_none() {
            self.line = Some(line);
            self.span = Some(span);
            self.source_id = source_id;
        }
        self
    }

    /// Detach an error raised inside an included file so that it can be
    /// anchored at the include call. The old location is kept as a note.
    pub(crate) fn into_nested(mut self, origin: &str) -> Self {
        let note = match self.line {
            Some(inner) => format!("raised in '{}' at line {}", origin, inner),
            None => format!("raised in '{}'", origin),
        };
        self.notes.push(note);
        self.line = None;
        self.span = None;
        self.source_id = 0;
        self
    }
}

impl From<RuntimeError> for DiagnosticError {
    fn from(error: RuntimeError) -> Self {
        DiagnosticError {
            error,
            line: None,
            span: None,
            source_id: 0,
            notes: Vec::new(),
        }
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for DiagnosticError {}

/// Failure of a whole render: the template did not parse, or it failed
/// while running.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))]
    Parse(Vec<ParseError>),
    #[error(transparent)]
    Runtime(#[from] DiagnosticError),
}
