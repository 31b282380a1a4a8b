pub mod error;
pub mod expression;
pub mod lower;
pub mod splice;
pub mod statement;
pub mod structural;

pub use error::{ParseError, ParseErrorKind};
pub use structural::build_tree;

use crate::Program;
use crate::line::join_lines;
use crate::tree::BlockNode;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Join, classify and match the source lines into a block tree.
    pub fn parse_tree(&self) -> Result<BlockNode, ParseError> {
        let lines = join_lines(&self.source);
        log::debug!("joined source into {} logical lines", lines.len());
        build_tree(&lines, self.file_id)
    }

    /// Parse the source into a complete, executable Program.
    pub fn parse(&self) -> Result<Program, Vec<ParseError>> {
        let tree = self.parse_tree().map_err(|e| vec![e])?;
        let instructions = lower::lower(&tree, self.file_id)?;
        log::debug!("lowered {} top-level instructions", instructions.len());
        Ok(Program {
            tree,
            instructions,
            source_id: self.file_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_tree_and_instructions() {
        let program = Parser::new("#py for i in range(2)\nitem `i`\n#py endfor\n".into(), 3)
            .parse()
            .unwrap();
        assert_eq!(program.source_id, 3);
        assert_eq!(program.tree.children().len(), 1);
        assert_eq!(program.instructions.len(), 1);
    }

    #[test]
    fn structural_errors_stop_before_lowering() {
        let errors = Parser::new("#py elif x\n#py endif".into(), 0).parse().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].kind,
            ParseErrorKind::Structural {
                tag: "elif".into(),
                after: "root".into()
            }
        );
        assert_eq!(errors[0].line, 1);
    }

    #[test]
    fn tree_dump() {
        let tree = Parser::new("a\n#py if x\n#py y = 1\n#py endif".into(), 0)
            .parse_tree()
            .unwrap();
        assert_eq!(
            tree.to_string(),
            "[root      ]\n[spool     ] a\n[if        ] if x\n[py        ]     y = 1\n"
        );
    }
}
