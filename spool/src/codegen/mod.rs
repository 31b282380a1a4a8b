use std::fmt::{self, Write};

use crate::parser::error::ParseError;
use crate::parser::splice::{Segment, split_splices};
use crate::tree::BlockNode;

/// Name of the function every literal line is routed through.
pub const ACCUMULATOR: &str = "output";

const INDENT: &str = "    ";

/// Escape `s` for use inside a string literal delimited by `delimiter`.
pub fn escape_string(delimiter: char, s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(delimiter, &format!("\\{}", delimiter))
        .replace('\n', "\\n")
}

/// Like [`escape_string`], with format placeholders braces doubled.
pub fn escape_format_string(delimiter: char, s: &str) -> String {
    escape_string(delimiter, s)
        .replace('{', "{{")
        .replace('}', "}}")
}

/// Failure while emitting one node.
enum EmitError {
    Parse(ParseError),
    Write(fmt::Error),
}

impl From<ParseError> for EmitError {
    fn from(error: ParseError) -> Self {
        EmitError::Parse(error)
    }
}

impl From<fmt::Error> for EmitError {
    fn from(error: fmt::Error) -> Self {
        EmitError::Write(error)
    }
}

/// Render the tree as procedural program text.
pub fn generate(root: &BlockNode, file_id: usize) -> Result<String, ParseError> {
    let mut out = String::new();
    for child in root.children() {
        emit(child, 0, file_id, &mut out).map_err(|e| match e {
            EmitError::Parse(error) => error,
            EmitError::Write(error) => ParseError::generation(
                format!("cannot write program text: {}", error),
                child.line_number().unwrap_or_default(),
                child.span().cloned().unwrap_or_default(),
                file_id,
            ),
        })?;
    }
    Ok(out)
}

/// Write `header` one line at a time at `pad`, ending the last line with
/// `suffix`.
fn write_header(out: &mut impl Write, pad: &str, header: &str, suffix: &str) -> fmt::Result {
    let mut lines = header.split('\n').peekable();
    while let Some(line) = lines.next() {
        if lines.peek().is_some() {
            writeln!(out, "{}{}", pad, line)?;
        } else {
            writeln!(out, "{}{}{}", pad, line, suffix)?;
        }
    }
    Ok(())
}

fn emit(
    node: &BlockNode,
    depth: usize,
    file_id: usize,
    out: &mut impl Write,
) -> Result<(), EmitError> {
    let pad = INDENT.repeat(depth);
    match node {
        BlockNode::Root { children } => {
            for child in children {
                emit(child, depth, file_id, out)?;
            }
        }

        BlockNode::Block {
            header,
            line_number,
            children,
            ..
        } => {
            let header = header.trim_end();
            let colon = if header.ends_with(':') { "" } else { ":" };
            write_header(out, &pad, header, &format!("{} # line {}", colon, line_number))?;
            if children.is_empty() {
                writeln!(out, "{}{}pass", pad, INDENT)?;
            }
            for child in children {
                emit(child, depth + 1, file_id, out)?;
            }
            writeln!(out)?;
        }

        BlockNode::Statement {
            header,
            line_number,
            ..
        } => {
            if header.trim().is_empty() {
                writeln!(out, "{}pass # line {}", pad, line_number)?;
                return Ok(());
            }
            write_header(out, &pad, header, &format!(" # line {}", line_number))?;
        }

        BlockNode::Spool {
            header,
            line_number,
            span,
        } => {
            let segments = split_splices(header).map_err(|e| {
                ParseError::generation(e.to_string(), *line_number, span.clone(), file_id)
            })?;
            let format = segments
                .iter()
                .step_by(2)
                .map(|s| escape_format_string('\'', segment_text(s)))
                .collect::<Vec<_>>()
                .join("{}");
            let arguments = segments
                .iter()
                .skip(1)
                .step_by(2)
                .map(|s| format!("({})", segment_text(s)))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                out,
                "{}{}('{}\\n'.format({})) # line {}",
                pad, ACCUMULATOR, format, arguments, line_number
            )?;
        }
    }
    Ok(())
}

fn segment_text<'a>(segment: &Segment<'a>) -> &'a str {
    match segment {
        Segment::Literal(text) | Segment::Expression(text) => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::join_lines;
    use crate::parser::error::ParseErrorKind;
    use crate::parser::structural::build_tree;

    fn program(source: &str) -> Result<String, ParseError> {
        generate(&build_tree(&join_lines(source), 0).unwrap(), 0)
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_string('\'', r"a\b'c"), r"a\\b\'c");
        assert_eq!(escape_string('\'', "x\ny"), "x\\ny");
        assert_eq!(escape_format_string('\'', "{x}"), "{{x}}");
        assert_eq!(escape_format_string('"', "it's \"q\""), "it's \\\"q\\\"");
    }

    #[test]
    fn empty_template_is_empty_program() {
        assert_eq!(program("").unwrap(), "");
    }

    #[test]
    fn for_loop_program() {
        assert_eq!(
            program("#py for i in range(2)\nitem `i`\n#py endfor").unwrap(),
            "for i in range(2): # line 1\n    output('item {}\\n'.format((i))) # line 2\n\n"
        );
    }

    #[test]
    fn literal_braces_and_quotes_are_escaped() {
        assert_eq!(
            program("int f() { return 'x'; }").unwrap(),
            "output('int f() {{ return \\'x\\'; }}\\n'.format()) # line 1\n"
        );
    }

    #[test]
    fn nested_blocks_and_statements() {
        let source = "#py x = 1\n#py if x:\n#py while x\n#py x -= 1\n#py endwhile\n\
                      #py else\n#py endif";
        let text = program(source).unwrap();
        assert_eq!(
            text,
            "x = 1 # line 1\n\
             if x: # line 2\n\
             \x20   while x: # line 3\n\
             \x20       x -= 1 # line 4\n\
             \n\
             \n\
             else: # line 6\n\
             \x20   pass\n\
             \n"
        );
    }

    #[test]
    fn continued_statement_lines_are_indented() {
        let text = program("#py if 1\n#py x = {\\\n'a': 1\\\n}\n#py endif").unwrap();
        assert_eq!(
            text,
            "if 1: # line 1\n    x = {\n    'a': 1\n    } # line 2\n\n"
        );
    }

    #[test]
    fn continued_block_headers_are_indented() {
        let source = "#py for i in x\n#py if i and\\\n   ok\nb\n#py endif\n#py endfor";
        let text = program(source).unwrap();
        assert_eq!(
            text,
            "for i in x: # line 1\n\
             \x20   if i and\n\
             \x20      ok: # line 2\n\
             \x20       output('b\\n'.format()) # line 4\n\
             \n\
             \n"
        );
    }

    #[test]
    fn unbalanced_splice_is_a_generation_fault() {
        let err = program("ok\nint `k = 1;").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Generation);
        assert_eq!(err.line, 2);
    }
}
