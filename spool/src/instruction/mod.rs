pub mod template_string;
pub mod value;

use std::ops::Range;

use crate::instruction::template_string::TemplateString;
use crate::instruction::value::{BinaryOperator, Value};

/// Binding target of a `for` loop or an unpacking assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Tuple(Vec<Target>),
}

/// A single statement from a bare directive line.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `target = expression`
    Assignment { target: Target, value: Value },
    /// `name[key] = expression`
    IndexAssignment {
        variable: String,
        key: Value,
        value: Value,
    },
    /// `name op= expression`
    AugmentedAssignment {
        variable: String,
        operator: BinaryOperator,
        value: Value,
    },
    /// Expression evaluation (side effects only, result discarded).
    Expression(Value),
    Pass,
}

/// One arm of an `if`/`elif`/`else` chain. `condition` is `None` for `else`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Option<Value>,
    pub body: Vec<Instruction>,
    pub line: usize,
    pub span: Range<usize>,
}

/// A single executable instruction lowered from the template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// A literal output line with its spliced expressions.
    Spool {
        template: TemplateString,
        line: usize,
        span: Range<usize>,
    },
    /// The statements of one bare directive line, run in order.
    Statements {
        statements: Vec<Statement>,
        line: usize,
        span: Range<usize>,
    },
    For {
        target: Target,
        iterable: Value,
        body: Vec<Instruction>,
        line: usize,
        span: Range<usize>,
    },
    While {
        condition: Value,
        body: Vec<Instruction>,
        line: usize,
        span: Range<usize>,
    },
    If {
        branches: Vec<Branch>,
    },
}

impl Instruction {
    /// Originating source line (the `if` line for conditional chains).
    pub fn line(&self) -> usize {
        match self {
            Instruction::Spool { line, .. }
            | Instruction::Statements { line, .. }
            | Instruction::For { line, .. }
            | Instruction::While { line, .. } => *line,
            Instruction::If { branches } => branches.first().map(|b| b.line).unwrap_or_default(),
        }
    }

    pub fn span(&self) -> Range<usize> {
        match self {
            Instruction::Spool { span, .. }
            | Instruction::Statements { span, .. }
            | Instruction::For { span, .. }
            | Instruction::While { span, .. } => span.clone(),
            Instruction::If { branches } => {
                branches.first().map(|b| b.span.clone()).unwrap_or_default()
            }
        }
    }
}
