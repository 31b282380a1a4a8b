use std::mem;

use crate::line::LogicalLine;
use crate::parser::error::ParseError;
use crate::rule;
use crate::tree::BlockNode;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the block tree from classified logical lines.
pub fn build_tree(lines: &[LogicalLine], file_id: usize) -> Result<BlockNode, ParseError> {
    let mut state = ParseState::new(file_id);
    for line in lines {
        state.process_line(line)?;
    }
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

/// `current` is the innermost open node; `pending` holds its ancestors.
/// A node is attached to its parent once it is closed (or, for chained
/// openers, once its successor in the chain opens).
struct ParseState {
    file_id: usize,
    current: BlockNode,
    pending: Vec<BlockNode>,
}

impl ParseState {
    fn new(file_id: usize) -> Self {
        ParseState {
            file_id,
            current: BlockNode::root(),
            pending: Vec::new(),
        }
    }

    fn process_line(&mut self, line: &LogicalLine) -> Result<(), ParseError> {
        let Some(directive) = &line.directive else {
            self.current.push_child(BlockNode::Spool {
                header: line.raw_text.clone(),
                line_number: line.line_number,
                span: line.span.clone(),
            });
            return Ok(());
        };

        // Closing tag of the innermost open block
        if let Some(open_rule) = self.current.rule()
            && open_rule.close_tag == directive.tag
        {
            self.close_current();
            return Ok(());
        }

        let Some(opener) = rule::lookup(&directive.tag) else {
            self.current.push_child(BlockNode::Statement {
                header: directive.header.clone(),
                line_number: line.line_number,
                span: line.span.clone(),
            });
            return Ok(());
        };

        let node = BlockNode::Block {
            tag: directive.tag.clone(),
            header: directive.header.clone(),
            rule: opener,
            line_number: line.line_number,
            span: line.span.clone(),
            children: Vec::new(),
        };

        if opener.is_chained() {
            if !opener.may_follow(self.current.tag()) {
                return Err(ParseError::structural(
                    &directive.tag,
                    self.current.tag(),
                    line.line_number,
                    line.span.clone(),
                    self.file_id,
                ));
            }
            // The previous link of the chain is complete; hand it to the parent.
            let finished = mem::replace(&mut self.current, node);
            if let Some(parent) = self.pending.last_mut() {
                parent.push_child(finished);
            }
        } else {
            let parent = mem::replace(&mut self.current, node);
            self.pending.push(parent);
        }
        Ok(())
    }

    fn close_current(&mut self) {
        if let Some(parent) = self.pending.pop() {
            let finished = mem::replace(&mut self.current, parent);
            self.current.push_child(finished);
        }
    }

    fn finalize(self) -> Result<BlockNode, ParseError> {
        if !self.pending.is_empty() {
            let expected = self.current.rule().map(|r| r.close_tag).unwrap_or_default();
            return Err(ParseError::unterminated(
                self.current.tag(),
                expected,
                self.current.line_number().unwrap_or_default(),
                self.current.span().cloned().unwrap_or_default(),
                self.file_id,
            ));
        }
        log::debug!(
            "built template tree with {} top-level nodes",
            self.current.children().len()
        );
        Ok(self.current)
    }
}
