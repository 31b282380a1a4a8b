pub mod codegen;
pub mod instruction;
pub mod line;
pub mod parser;
pub mod rule;
pub mod tree;

use crate::instruction::Instruction;
use crate::tree::BlockNode;

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Program {
    /// The matched block tree (tree dump and program text are rendered from it).
    pub tree: BlockNode,
    /// Top-level executable instructions.
    pub instructions: Vec<Instruction>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}
