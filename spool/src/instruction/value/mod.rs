#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    /// Arithmetic negation: -x
    Negation,
    /// Unary plus: +x
    Identity,
    /// Logical not: not x, !x
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    FloorDivision,
    Modulo,
    Power,
    LogicalAnd,
    LogicalOr,
    Equality,
    Inequality,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    In,
    NotIn,
}

impl BinaryOperator {
    /// Source spelling, used in error messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Addition => "+",
            BinaryOperator::Subtraction => "-",
            BinaryOperator::Multiplication => "*",
            BinaryOperator::Division => "/",
            BinaryOperator::FloorDivision => "//",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "**",
            BinaryOperator::LogicalAnd => "and",
            BinaryOperator::LogicalOr => "or",
            BinaryOperator::Equality => "==",
            BinaryOperator::Inequality => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::In => "in",
            BinaryOperator::NotIn => "not in",
        }
    }
}

/// An expression AST node of the embedded language.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    // Literals
    NoneLiteral,
    BooleanLiteral(bool),
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),

    // Displays
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Vec<(Value, Value)>),

    VariableReference(String),

    // Operations
    UnaryOperation {
        operator: UnaryOperator,
        operand: Box<Value>,
    },
    BinaryOperation {
        operator: BinaryOperator,
        left: Box<Value>,
        right: Box<Value>,
    },

    /// `true_branch if condition else false_branch`
    Conditional {
        condition: Box<Value>,
        true_branch: Box<Value>,
        false_branch: Box<Value>,
    },

    /// Call of a builtin function by name: `range(3)`
    Call {
        function: String,
        arguments: Vec<Value>,
    },
    /// `receiver.method(args)`
    MethodCall {
        receiver: Box<Value>,
        method: String,
        arguments: Vec<Value>,
    },
    /// `target[index]`
    Index {
        target: Box<Value>,
        index: Box<Value>,
    },
}
