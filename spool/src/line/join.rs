use std::ops::Range;

use crate::line::{CONTINUATION_MARKER, LogicalLine, directive_body};

/// A physical line: 1-based number, byte span (terminator excluded) and text.
struct PhysicalLine<'a> {
    number: usize,
    span: Range<usize>,
    text: &'a str,
}

/// A continuation run being accumulated.
struct Run {
    first_line: usize,
    start: usize,
    text: String,
}

fn physical_lines(source: &str) -> Vec<PhysicalLine<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (idx, chunk) in source.split_inclusive('\n').enumerate() {
        let text = chunk.strip_suffix('\n').unwrap_or(chunk);
        let text = text.strip_suffix('\r').unwrap_or(text);
        lines.push(PhysicalLine {
            number: idx + 1,
            span: offset..offset + text.len(),
            text,
        });
        offset += chunk.len();
    }
    lines
}

/// Merge continued directive lines into logical lines.
///
/// Only a directive line can start a continuation run; once started, every
/// following physical line ending in the marker extends the run. A run still
/// open at end of input is closed as if followed by an empty line.
pub fn join_lines(source: &str) -> Vec<LogicalLine> {
    let mut logical = Vec::new();
    let mut run: Option<Run> = None;
    let mut last_end = 0;

    for line in physical_lines(source) {
        last_end = line.span.end;
        match run.take() {
            Some(mut open) => match line.text.strip_suffix(CONTINUATION_MARKER) {
                Some(stripped) => {
                    open.text.push_str(stripped);
                    open.text.push('\n');
                    run = Some(open);
                }
                None => {
                    open.text.push_str(line.text);
                    logical.push(LogicalLine::new(
                        open.first_line,
                        open.start..line.span.end,
                        open.text,
                    ));
                }
            },
            None => {
                if directive_body(line.text).is_some()
                    && let Some(stripped) = line.text.strip_suffix(CONTINUATION_MARKER)
                {
                    run = Some(Run {
                        first_line: line.number,
                        start: line.span.start,
                        text: format!("{}\n", stripped),
                    });
                } else {
                    logical.push(LogicalLine::new(line.number, line.span, line.text.to_string()));
                }
            }
        }
    }

    if let Some(open) = run {
        log::debug!(
            "continuation on line {} runs to end of input",
            open.first_line
        );
        logical.push(LogicalLine::new(open.first_line, open.start..last_end, open.text));
    }

    logical
}
