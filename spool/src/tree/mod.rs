use std::fmt;
use std::ops::Range;

use crate::rule::BlockRule;

/// A node of the parsed template tree.
/// Children are owned exclusively by their parent, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockNode {
    Root {
        children: Vec<BlockNode>,
    },
    /// A control block opened by a directive with a matching rule.
    Block {
        tag: String,
        header: String,
        rule: &'static BlockRule,
        line_number: usize,
        span: Range<usize>,
        children: Vec<BlockNode>,
    },
    /// A literal output line.
    Spool {
        header: String,
        line_number: usize,
        span: Range<usize>,
    },
    /// A bare embedded statement.
    Statement {
        header: String,
        line_number: usize,
        span: Range<usize>,
    },
}

impl BlockNode {
    pub fn root() -> Self {
        BlockNode::Root {
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            BlockNode::Root { .. } => "root",
            BlockNode::Block { tag, .. } => tag,
            BlockNode::Spool { .. } => "spool",
            BlockNode::Statement { .. } => "py",
        }
    }

    pub fn header(&self) -> Option<&str> {
        match self {
            BlockNode::Root { .. } => None,
            BlockNode::Block { header, .. }
            | BlockNode::Spool { header, .. }
            | BlockNode::Statement { header, .. } => Some(header),
        }
    }

    pub fn line_number(&self) -> Option<usize> {
        match self {
            BlockNode::Root { .. } => None,
            BlockNode::Block { line_number, .. }
            | BlockNode::Spool { line_number, .. }
            | BlockNode::Statement { line_number, .. } => Some(*line_number),
        }
    }

    pub fn span(&self) -> Option<&Range<usize>> {
        match self {
            BlockNode::Root { .. } => None,
            BlockNode::Block { span, .. }
            | BlockNode::Spool { span, .. }
            | BlockNode::Statement { span, .. } => Some(span),
        }
    }

    /// The rule of an open block; `None` for the root and leaves.
    pub fn rule(&self) -> Option<&'static BlockRule> {
        match self {
            BlockNode::Block { rule, .. } => Some(*rule),
            _ => None,
        }
    }

    pub fn children(&self) -> &[BlockNode] {
        match self {
            BlockNode::Root { children } | BlockNode::Block { children, .. } => children,
            BlockNode::Spool { .. } | BlockNode::Statement { .. } => &[],
        }
    }

    /// Append a child. Leaves never hold children; pushing onto one is a no-op.
    pub(crate) fn push_child(&mut self, child: BlockNode) {
        match self {
            BlockNode::Root { children } | BlockNode::Block { children, .. } => {
                children.push(child)
            }
            BlockNode::Spool { .. } | BlockNode::Statement { .. } => {}
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            BlockNode::Root { children } => {
                writeln!(f, "[{:10}]", "root")?;
                for child in children {
                    child.fmt_indented(f, depth)?;
                }
                Ok(())
            }
            node => {
                let pad = "    ".repeat(depth);
                let header = node.header().unwrap_or_default();
                let mut lines = header.split('\n');
                writeln!(f, "[{:10}] {}{}", node.tag(), pad, lines.next().unwrap_or_default())?;
                for rest in lines {
                    writeln!(f, "{:12} {}{}", "", pad, rest)?;
                }
                for child in node.children() {
                    child.fmt_indented(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Diagnostic dump: one row per node, tag column then indented header.
impl fmt::Display for BlockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
