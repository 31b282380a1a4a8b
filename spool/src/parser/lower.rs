use std::ops::Range;

use crate::instruction::template_string::{TemplateString, TemplateStringPart};
use crate::instruction::{Branch, Instruction};
use crate::parser::error::ParseError;
use crate::parser::expression::parse_expression;
use crate::parser::splice::{Segment, split_splices};
use crate::parser::statement::{parse_for_header, parse_statements};
use crate::tree::BlockNode;

/// Compile the block tree into executable instructions.
///
/// Every line that fails to compile is reported; the instructions are only
/// returned when there are no faults.
pub fn lower(root: &BlockNode, file_id: usize) -> Result<Vec<Instruction>, Vec<ParseError>> {
    let mut errors = Vec::new();
    let instructions = lower_children(root.children(), file_id, &mut errors);
    if errors.is_empty() {
        Ok(instructions)
    } else {
        Err(errors)
    }
}

fn lower_children(
    children: &[BlockNode],
    file_id: usize,
    errors: &mut Vec<ParseError>,
) -> Vec<Instruction> {
    let mut out: Vec<Instruction> = Vec::new();

    for child in children {
        match child {
            BlockNode::Root { .. } => {}

            BlockNode::Spool {
                header,
                line_number,
                span,
            } => match lower_spool(header, *line_number, span, file_id) {
                Ok(instruction) => out.push(instruction),
                Err(e) => errors.push(e),
            },

            BlockNode::Statement {
                header,
                line_number,
                span,
            } => match parse_statements(header, *line_number, span.clone(), file_id) {
                Ok(statements) => out.push(Instruction::Statements {
                    statements,
                    line: *line_number,
                    span: span.clone(),
                }),
                Err(e) => errors.push(e),
            },

            BlockNode::Block {
                tag,
                header,
                line_number,
                span,
                children,
                ..
            } => {
                let body = lower_children(children, file_id, errors);
                let line = *line_number;
                let text = header_body(header);

                let lowered = match tag.as_str() {
                    "for" => parse_for_header(text, line, span.clone(), file_id).map(
                        |(target, iterable)| {
                            Some(Instruction::For {
                                target,
                                iterable,
                                body,
                                line,
                                span: span.clone(),
                            })
                        },
                    ),
                    "while" => parse_expression(text, line, span.clone(), file_id).map(
                        |condition| {
                            Some(Instruction::While {
                                condition,
                                body,
                                line,
                                span: span.clone(),
                            })
                        },
                    ),
                    "if" => parse_expression(text, line, span.clone(), file_id).map(|condition| {
                        Some(Instruction::If {
                            branches: vec![Branch {
                                condition: Some(condition),
                                body,
                                line,
                                span: span.clone(),
                            }],
                        })
                    }),
                    "elif" | "else" => {
                        let condition = if tag == "else" {
                            if text.is_empty() {
                                Ok(None)
                            } else {
                                Err(ParseError::generation(
                                    format!("unexpected \"{}\" after \"else\"", text),
                                    line,
                                    span.clone(),
                                    file_id,
                                ))
                            }
                        } else {
                            parse_expression(text, line, span.clone(), file_id).map(Some)
                        };
                        condition.map(|condition| {
                            // The tree guarantees the previous sibling is the chain's `if`;
                            // it is only missing when that header failed to compile.
                            if let Some(Instruction::If { branches }) = out.last_mut() {
                                branches.push(Branch {
                                    condition,
                                    body,
                                    line,
                                    span: span.clone(),
                                });
                            }
                            None
                        })
                    }
                    other => Err(ParseError::generation(
                        format!("no lowering for block \"{}\"", other),
                        line,
                        span.clone(),
                        file_id,
                    )),
                };

                match lowered {
                    Ok(Some(instruction)) => out.push(instruction),
                    Ok(None) => {}
                    Err(e) => errors.push(e),
                }
            }
        }
    }

    out
}

/// The header text after the tag, with a trailing `:` removed.
pub(crate) fn header_body(header: &str) -> &str {
    let header = header.trim();
    let rest = match header.find(char::is_whitespace) {
        Some(idx) => &header[idx..],
        None => "",
    };
    let rest = rest.trim();
    rest.strip_suffix(':').map(str::trim_end).unwrap_or(rest)
}

fn lower_spool(
    header: &str,
    line: usize,
    span: &Range<usize>,
    file_id: usize,
) -> Result<Instruction, ParseError> {
    let segments = split_splices(header)
        .map_err(|e| ParseError::generation(e.to_string(), line, span.clone(), file_id))?;

    let mut parts = Vec::new();
    for segment in segments {
        match segment {
            Segment::Literal("") => {}
            Segment::Literal(text) => parts.push(TemplateStringPart::Literal(text.to_string())),
            Segment::Expression(source) => {
                if source.trim().is_empty() {
                    return Err(ParseError::generation(
                        "empty embedded expression",
                        line,
                        span.clone(),
                        file_id,
                    ));
                }
                let value = parse_expression(source, line, span.clone(), file_id)
                    .map_err(|e| e.with_note(format!("in embedded expression `{}`", source)))?;
                parts.push(TemplateStringPart::Expression(value));
            }
        }
    }

    Ok(Instruction::Spool {
        template: TemplateString { parts },
        line,
        span: span.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Target;
    use crate::instruction::value::Value;
    use crate::line::join_lines;
    use crate::parser::error::ParseErrorKind;
    use crate::parser::structural::build_tree;

    fn lower_source(source: &str) -> Result<Vec<Instruction>, Vec<ParseError>> {
        let tree = build_tree(&join_lines(source), 0).unwrap();
        lower(&tree, 0)
    }

    #[test]
    fn header_body_strips_tag_and_colon() {
        assert_eq!(header_body("for i in range(3):"), "i in range(3)");
        assert_eq!(header_body("if a == 1"), "a == 1");
        assert_eq!(header_body("else:"), "");
        assert_eq!(header_body("else"), "");
        assert_eq!(header_body("while x :  "), "x");
    }

    #[test]
    fn spool_line_parts() {
        let lowered = lower_source("line `1+1` end").unwrap();
        let Instruction::Spool { template, line, .. } = &lowered[0] else {
            panic!("expected spool, got {:?}", lowered[0]);
        };
        assert_eq!(*line, 1);
        assert_eq!(template.parts.len(), 3);
        assert!(matches!(
            &template.parts[1],
            TemplateStringPart::Expression(Value::BinaryOperation { .. })
        ));
    }

    #[test]
    fn conditional_chain_is_folded() {
        let lowered = lower_source("#py if a\nx\n#py elif b\ny\n#py else:\nz\n#py endif").unwrap();
        assert_eq!(lowered.len(), 1);
        let Instruction::If { branches } = &lowered[0] else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 3);
        assert!(branches[2].condition.is_none());
        assert_eq!(branches[1].line, 3);
    }

    #[test]
    fn for_loop_target() {
        let lowered = lower_source("#py for k, v in d.items():\n`k`\n#py endfor").unwrap();
        let Instruction::For { target, body, .. } = &lowered[0] else {
            panic!("expected for");
        };
        assert!(matches!(target, Target::Tuple(items) if items.len() == 2));
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn all_generation_faults_are_reported() {
        let errors = lower_source("a `b\n#py x = = 1\n#py if\n#py endif\nok").unwrap_err();
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert!(errors.iter().all(|e| e.kind == ParseErrorKind::Generation));
        assert!(errors[0].message.contains("unbalanced"));
    }

    #[test]
    fn else_with_condition_is_a_fault() {
        let errors = lower_source("#py if a\n#py else b\n#py endif").unwrap_err();
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn empty_splice_is_a_fault() {
        let errors = lower_source("a `` b").unwrap_err();
        assert!(errors[0].message.contains("empty embedded expression"));
    }
}
