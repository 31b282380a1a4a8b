pub mod join;

use std::ops::Range;

pub use join::join_lines;

/// Marker that starts a directive line. Must be followed by whitespace.
pub const DIRECTIVE_PREFIX: &str = "#py";

/// Trailing character that continues a directive onto the next physical line.
pub const CONTINUATION_MARKER: char = '\\';

/// One parseable unit of input after continuation lines have been joined.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    /// 1-based number of the first physical line of the run.
    pub line_number: usize,
    /// Byte span in the source covering every physical line of the run.
    pub span: Range<usize>,
    /// Joined text; continuation joins are represented as `\n`.
    pub raw_text: String,
    pub directive: Option<Directive>,
}

/// The parts of a directive line after the prefix has been removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// First token of the directive body, one trailing `:` stripped.
    pub tag: String,
    /// Directive text without the prefix. Includes the tag.
    pub header: String,
}

impl LogicalLine {
    pub fn new(line_number: usize, span: Range<usize>, raw_text: String) -> Self {
        let directive = classify(&raw_text);
        LogicalLine {
            line_number,
            span,
            raw_text,
            directive,
        }
    }

    pub fn is_directive(&self) -> bool {
        self.directive.is_some()
    }

    pub fn tag(&self) -> Option<&str> {
        self.directive.as_ref().map(|d| d.tag.as_str())
    }
}

/// Returns the directive body if `text` starts with the prefix plus whitespace.
pub fn directive_body(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(DIRECTIVE_PREFIX)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Split a line into tag and header, or `None` for literal text.
pub fn classify(text: &str) -> Option<Directive> {
    let header = directive_body(text)?;
    let first = header.split_whitespace().next().unwrap_or("");
    let tag = first.strip_suffix(':').unwrap_or(first);
    Some(Directive {
        tag: tag.to_string(),
        header: header.to_string(),
    })
}
