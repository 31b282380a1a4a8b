use std::fmt;
use std::ops::Range;

use crate::instruction::Target;
use crate::instruction::value::{BinaryOperator, UnaryOperator, Value};
use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    Str(String),
    True,
    False,
    None,

    Ident(String),

    // Keywords
    And,
    Or,
    Not,
    In,
    If,
    Else,
    Pass,
    /// A keyword of the host language this engine does not implement.
    Reserved(String),

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Eq,      // =
    EqEq,    // ==
    BangEq,  // !=
    Gt,
    Lt,
    GtEq,
    LtEq,
    AmpAmp,  // &&
    PipePipe, // ||
    Bang,    // !
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    SlashSlashEq,
    PercentEq,

    // Punctuation
    Comma,
    Colon,
    Semicolon,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    /// Statement separator; only produced outside brackets in statement mode.
    Newline,
}

const RESERVED: &[&str] = &[
    "def", "class", "import", "from", "return", "lambda", "yield", "try", "except", "finally",
    "with", "global", "nonlocal", "del", "assert", "raise", "for", "while", "elif", "break",
    "continue", "is", "async", "await",
];

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Integer(n) => return write!(f, "{}", n),
            Token::Float(n) => return write!(f, "{}", n),
            Token::Str(s) => return write!(f, "'{}'", s),
            Token::Ident(name) | Token::Reserved(name) => return write!(f, "{}", name),
            Token::True => "True",
            Token::False => "False",
            Token::None => "None",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::In => "in",
            Token::If => "if",
            Token::Else => "else",
            Token::Pass => "pass",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::StarStar => "**",
            Token::Slash => "/",
            Token::SlashSlash => "//",
            Token::Percent => "%",
            Token::Eq => "=",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Gt => ">",
            Token::Lt => "<",
            Token::GtEq => ">=",
            Token::LtEq => "<=",
            Token::AmpAmp => "&&",
            Token::PipePipe => "||",
            Token::Bang => "!",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::SlashSlashEq => "//=",
            Token::PercentEq => "%=",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::Dot => ".",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Newline => "newline",
        };
        write!(f, "{}", text)
    }
}

// ---------------------------------------------------------------------------
// Tokenizer: raw text → Token stream
// ---------------------------------------------------------------------------

/// Tokenize embedded source text.
///
/// With `newlines` set, a line break outside brackets becomes a
/// [`Token::Newline`] separator; otherwise line breaks are whitespace.
pub(crate) fn tokenize(text: &str, newlines: bool) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < len {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' => {
                i += 1;
            }
            '\n' => {
                i += 1;
                if newlines && depth == 0 && !matches!(tokens.last(), None | Some(Token::Newline)) {
                    tokens.push(Token::Newline);
                }
            }

            // Comment to end of line
            '#' => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }

            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i).copied() {
                        None | Some('\n') => return Err("unterminated string literal".into()),
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .copied()
                                .ok_or_else(|| "unterminated string literal".to_string())?;
                            match escaped {
                                'n' => s.push('\n'),
                                't' => s.push('\t'),
                                'r' => s.push('\r'),
                                '0' => s.push('\0'),
                                '\\' | '\'' | '"' => s.push(escaped),
                                other => {
                                    s.push('\\');
                                    s.push(other);
                                }
                            }
                            i += 2;
                        }
                        Some(ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }

            '0'..='9' => {
                let (token, next) = scan_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            '.' if chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) => {
                let (token, next) = scan_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                tokens.push(match ident.as_str() {
                    "True" | "true" => Token::True,
                    "False" | "false" => Token::False,
                    "None" => Token::None,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "pass" => Token::Pass,
                    kw if RESERVED.contains(&kw) => Token::Reserved(ident),
                    _ => Token::Ident(ident),
                });
            }

            '(' | '[' | '{' => {
                i += 1;
                depth += 1;
                tokens.push(match c {
                    '(' => Token::LParen,
                    '[' => Token::LBracket,
                    _ => Token::LBrace,
                });
            }
            ')' | ']' | '}' => {
                i += 1;
                depth = depth.saturating_sub(1);
                tokens.push(match c {
                    ')' => Token::RParen,
                    ']' => Token::RBracket,
                    _ => Token::RBrace,
                });
            }

            // Operators, longest match first
            _ => {
                let next = chars.get(i + 1).copied();
                let third = chars.get(i + 2).copied();
                let (token, width) = match (c, next, third) {
                    ('/', Some('/'), Some('=')) => (Token::SlashSlashEq, 3),
                    ('/', Some('/'), _) => (Token::SlashSlash, 2),
                    ('/', Some('='), _) => (Token::SlashEq, 2),
                    ('/', _, _) => (Token::Slash, 1),
                    ('*', Some('*'), _) => (Token::StarStar, 2),
                    ('*', Some('='), _) => (Token::StarEq, 2),
                    ('*', _, _) => (Token::Star, 1),
                    ('+', Some('='), _) => (Token::PlusEq, 2),
                    ('+', _, _) => (Token::Plus, 1),
                    ('-', Some('='), _) => (Token::MinusEq, 2),
                    ('-', _, _) => (Token::Minus, 1),
                    ('%', Some('='), _) => (Token::PercentEq, 2),
                    ('%', _, _) => (Token::Percent, 1),
                    ('=', Some('='), _) => (Token::EqEq, 2),
                    ('=', _, _) => (Token::Eq, 1),
                    ('!', Some('='), _) => (Token::BangEq, 2),
                    ('!', _, _) => (Token::Bang, 1),
                    ('>', Some('='), _) => (Token::GtEq, 2),
                    ('>', _, _) => (Token::Gt, 1),
                    ('<', Some('='), _) => (Token::LtEq, 2),
                    ('<', _, _) => (Token::Lt, 1),
                    ('&', Some('&'), _) => (Token::AmpAmp, 2),
                    ('|', Some('|'), _) => (Token::PipePipe, 2),
                    (',', _, _) => (Token::Comma, 1),
                    (':', _, _) => (Token::Colon, 1),
                    (';', _, _) => (Token::Semicolon, 1),
                    ('.', _, _) => (Token::Dot, 1),
                    (other, _, _) => return Err(format!("unexpected character '{}'", other)),
                };
                i += width;
                tokens.push(token);
            }
        }
    }

    if matches!(tokens.last(), Some(Token::Newline)) {
        tokens.pop();
    }
    Ok(tokens)
}

fn scan_number(chars: &[char], start: usize) -> Result<(Token, usize), String> {
    let len = chars.len();
    let mut i = start;
    let mut is_float = false;
    while i < len && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if i < len && chars[i] == '.' && !chars.get(i + 1).is_some_and(|c| c.is_alphabetic()) {
        is_float = true;
        i += 1;
        while i < len && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < len && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < len && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < len && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < len && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    let token = if is_float {
        Token::Float(
            text.parse::<f64>()
                .map_err(|_| format!("invalid number literal '{}'", text))?,
        )
    } else {
        Token::Integer(
            text.parse::<i64>()
                .map_err(|_| format!("integer literal '{}' is out of range", text))?,
        )
    };
    Ok((token, i))
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

pub(crate) struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    line: usize,
    span: Range<usize>,
    file_id: usize,
    /// Height of the tree being built above the cursor.
    depth: usize,
}

/// Deepest expression tree the parser will build. Stays below the
/// evaluator's recursion limit.
const MAX_NESTING: usize = 200;

// Binding powers (precedence). Higher = tighter binding.
// Left bp, right bp. For left-assoc: right = left + 1. For right-assoc: right = left - 1.
const BP_CONDITIONAL: u8 = 2;     // x if c else y
const BP_OR: u8 = 4;              // or ||
const BP_AND: u8 = 6;             // and &&
const BP_NOT: u8 = 8;             // not !
const BP_COMPARISON: u8 = 10;     // == != < > <= >= in, not in
const BP_ADDITIVE: u8 = 12;       // + -
const BP_MULTIPLICATIVE: u8 = 14; // * / // %
const BP_UNARY: u8 = 16;          // - +
const BP_POWER: u8 = 18;          // **

impl ExprParser {
    pub(crate) fn new(tokens: Vec<Token>, line: usize, span: Range<usize>, file_id: usize) -> Self {
        ExprParser {
            tokens,
            pos: 0,
            line,
            span,
            file_id,
            depth: 0,
        }
    }

    /// Tokenize `text` and wrap the result in a parser.
    pub(crate) fn from_source(
        text: &str,
        newlines: bool,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Result<Self, ParseError> {
        let tokens = tokenize(text, newlines)
            .map_err(|msg| ParseError::generation(msg, line, span.clone(), file_id))?;
        Ok(ExprParser::new(tokens, line, span, file_id))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        match self.advance() {
            Some(t) if &t == token => Ok(()),
            Some(t) => Err(self.error(format!("expected '{}', found '{}'", token, t))),
            None => Err(self.error(format!("expected '{}' at end of input", token))),
        }
    }

    pub(crate) fn error(&self, msg: impl Into<String>) -> ParseError {
        ParseError::generation(msg, self.line, self.span.clone(), self.file_id)
    }

    /// Count one more level of nesting.
    fn nest(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    /// Fail unless every token has been consumed.
    pub(crate) fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(self.error(format!("unexpected '{}'", t))),
        }
    }

    // ------------------------------------------------------------------
    // Pratt parser core
    // ------------------------------------------------------------------

    /// Parse a comma-separated expression list; more than one item is a tuple.
    pub(crate) fn parse_expr_list(&mut self) -> Result<Value, ParseError> {
        let first = self.parse_expr(0)?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.at_expression_end() {
                break;
            }
            items.push(self.parse_expr(0)?);
        }
        Ok(Value::Tuple(items))
    }

    fn at_expression_end(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(Token::RParen | Token::RBracket | Token::RBrace | Token::Eq | Token::Colon)
        )
    }

    pub(crate) fn parse_expr(&mut self, min_bp: u8) -> Result<Value, ParseError> {
        let outer = self.depth;
        let result = self.nest().and_then(|()| self.parse_expr_nested(min_bp));
        self.depth = outer;
        result
    }

    fn parse_expr_nested(&mut self, min_bp: u8) -> Result<Value, ParseError> {
        let mut left = self.parse_prefix()?;

        loop {
            // Postfix: call, index, method call
            match self.peek() {
                Some(Token::LParen) => {
                    self.nest()?;
                    left = self.parse_call(left)?;
                    continue;
                }
                Some(Token::LBracket) => {
                    self.nest()?;
                    self.advance();
                    let index = self.parse_expr_list()?;
                    self.expect(&Token::RBracket)?;
                    left = Value::Index {
                        target: Box::new(left),
                        index: Box::new(index),
                    };
                    continue;
                }
                Some(Token::Dot) => {
                    self.nest()?;
                    self.advance();
                    let method = match self.advance() {
                        Some(Token::Ident(name)) => name,
                        _ => return Err(self.error("expected method name after '.'")),
                    };
                    if !self.check(&Token::LParen) {
                        return Err(self.error(format!(
                            "attribute access '.{}' is not supported; only method calls are",
                            method
                        )));
                    }
                    self.advance();
                    let arguments = self.parse_sequence(&Token::RParen)?;
                    left = Value::MethodCall {
                        receiver: Box::new(left),
                        method,
                        arguments,
                    };
                    continue;
                }
                _ => {}
            }

            let Some((operator, l_bp, r_bp, width)) = self.infix_operator() else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.pos += width;
            // Each operator wraps the tree built so far.
            self.nest()?;

            // Special case: conditional expression
            let Some(operator) = operator else {
                let condition = self.parse_expr(BP_CONDITIONAL + 1)?;
                self.expect(&Token::Else)?;
                let false_branch = self.parse_expr(BP_CONDITIONAL)?;
                left = Value::Conditional {
                    condition: Box::new(condition),
                    true_branch: Box::new(left),
                    false_branch: Box::new(false_branch),
                };
                continue;
            };

            let right = self.parse_expr(r_bp)?;
            left = Value::BinaryOperation {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// The infix operator at the cursor: (operator, left bp, right bp, token
    /// width). The operator is `None` for the conditional `if`.
    fn infix_operator(&self) -> Option<(Option<BinaryOperator>, u8, u8, usize)> {
        let binary = |op, bp: u8| Some((Some(op), bp, bp + 1, 1));
        match self.peek()? {
            Token::If => Some((None, BP_CONDITIONAL, BP_CONDITIONAL, 1)),
            Token::Or | Token::PipePipe => binary(BinaryOperator::LogicalOr, BP_OR),
            Token::And | Token::AmpAmp => binary(BinaryOperator::LogicalAnd, BP_AND),
            Token::EqEq => binary(BinaryOperator::Equality, BP_COMPARISON),
            Token::BangEq => binary(BinaryOperator::Inequality, BP_COMPARISON),
            Token::Gt => binary(BinaryOperator::GreaterThan, BP_COMPARISON),
            Token::Lt => binary(BinaryOperator::LessThan, BP_COMPARISON),
            Token::GtEq => binary(BinaryOperator::GreaterThanOrEqual, BP_COMPARISON),
            Token::LtEq => binary(BinaryOperator::LessThanOrEqual, BP_COMPARISON),
            Token::In => binary(BinaryOperator::In, BP_COMPARISON),
            Token::Not if self.peek_at(1) == Some(&Token::In) => Some((
                Some(BinaryOperator::NotIn),
                BP_COMPARISON,
                BP_COMPARISON + 1,
                2,
            )),
            Token::Plus => binary(BinaryOperator::Addition, BP_ADDITIVE),
            Token::Minus => binary(BinaryOperator::Subtraction, BP_ADDITIVE),
            Token::Star => binary(BinaryOperator::Multiplication, BP_MULTIPLICATIVE),
            Token::Slash => binary(BinaryOperator::Division, BP_MULTIPLICATIVE),
            Token::SlashSlash => binary(BinaryOperator::FloorDivision, BP_MULTIPLICATIVE),
            Token::Percent => binary(BinaryOperator::Modulo, BP_MULTIPLICATIVE),
            Token::StarStar => Some((Some(BinaryOperator::Power), BP_POWER, BP_POWER - 1, 1)),
            _ => None,
        }
    }

    fn parse_prefix(&mut self) -> Result<Value, ParseError> {
        let token = self
            .advance()
            .ok_or_else(|| self.error("expected an expression"))?;

        match token {
            // Literals
            Token::Integer(n) => Ok(Value::IntegerLiteral(n)),
            Token::Float(n) => Ok(Value::FloatLiteral(n)),
            Token::Str(s) => Ok(Value::StringLiteral(s)),
            Token::True => Ok(Value::BooleanLiteral(true)),
            Token::False => Ok(Value::BooleanLiteral(false)),
            Token::None => Ok(Value::NoneLiteral),

            Token::Ident(name) => Ok(Value::VariableReference(name)),

            // Unary operators
            Token::Minus => Ok(Value::UnaryOperation {
                operator: UnaryOperator::Negation,
                operand: Box::new(self.parse_expr(BP_UNARY)?),
            }),
            Token::Plus => Ok(Value::UnaryOperation {
                operator: UnaryOperator::Identity,
                operand: Box::new(self.parse_expr(BP_UNARY)?),
            }),
            Token::Not | Token::Bang => Ok(Value::UnaryOperation {
                operator: UnaryOperator::LogicalNot,
                operand: Box::new(self.parse_expr(BP_NOT)?),
            }),

            // Grouping or tuple
            Token::LParen => {
                if self.eat(&Token::RParen) {
                    return Ok(Value::Tuple(Vec::new()));
                }
                let inner = self.parse_expr_list()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }

            Token::LBracket => Ok(Value::List(self.parse_sequence(&Token::RBracket)?)),

            Token::LBrace => {
                let mut entries = Vec::new();
                loop {
                    if self.eat(&Token::RBrace) {
                        break;
                    }
                    let key = self.parse_expr(0)?;
                    self.expect(&Token::Colon)?;
                    let value = self.parse_expr(0)?;
                    entries.push((key, value));
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBrace)?;
                        break;
                    }
                }
                Ok(Value::Dict(entries))
            }

            Token::Reserved(kw) => Err(self.error(format!("'{}' is not supported here", kw))),

            other => Err(self.error(format!("unexpected '{}'", other))),
        }
    }

    fn parse_call(&mut self, callee: Value) -> Result<Value, ParseError> {
        self.expect(&Token::LParen)?;
        let arguments = self.parse_sequence(&Token::RParen)?;
        match callee {
            Value::VariableReference(function) => Ok(Value::Call {
                function,
                arguments,
            }),
            _ => Err(self.error("only named functions can be called")),
        }
    }

    /// Parse comma-separated expressions up to and including `close`.
    /// A trailing comma is allowed.
    fn parse_sequence(&mut self, close: &Token) -> Result<Vec<Value>, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                break;
            }
            items.push(self.parse_expr(0)?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    // ------------------------------------------------------------------
    // Binding targets
    // ------------------------------------------------------------------

    /// Parse a name or a comma-separated, optionally parenthesised, tuple of
    /// targets.
    pub(crate) fn parse_target(&mut self) -> Result<Target, ParseError> {
        let first = self.parse_target_atom()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if !matches!(self.peek(), Some(Token::Ident(_) | Token::LParen)) {
                break;
            }
            items.push(self.parse_target_atom()?);
        }
        Ok(Target::Tuple(items))
    }

    fn parse_target_atom(&mut self) -> Result<Target, ParseError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(Target::Name(name)),
            Some(Token::LParen) => {
                let outer = self.depth;
                let inner = self.nest().and_then(|()| self.parse_target());
                self.depth = outer;
                let inner = inner?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(other) => Err(self.error(format!("cannot assign to '{}'", other))),
            None => Err(self.error("expected a name to bind")),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a standalone expression (splice segment, condition, iterable).
pub fn parse_expression(
    text: &str,
    line: usize,
    span: Range<usize>,
    file_id: usize,
) -> Result<Value, ParseError> {
    let mut parser = ExprParser::from_source(text, false, line, span, file_id)?;
    let value = parser.parse_expr_list()?;
    parser.expect_end()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Value {
        parse_expression(text, 1, 0..0, 0).unwrap()
    }

    fn binary(operator: BinaryOperator, left: Value, right: Value) -> Value {
        Value::BinaryOperation {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn tokenizes_operators_longest_first() {
        let tokens = tokenize("a //= b ** 2 != c", false).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::SlashSlashEq,
                Token::Ident("b".into()),
                Token::StarStar,
                Token::Integer(2),
                Token::BangEq,
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn newlines_only_separate_outside_brackets() {
        let tokens = tokenize("x = {\n'a': 1\n}\ny = 2\n", true).unwrap();
        let newlines = tokens.iter().filter(|t| **t == Token::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn string_escapes() {
        let tokens = tokenize(r#"'it\'s' "a\nb""#, false).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Str("it's".into()), Token::Str("a\nb".into())]
        );
        assert!(tokenize("'open", false).is_err());
    }

    #[test]
    fn numbers() {
        assert_eq!(parse("42"), Value::IntegerLiteral(42));
        assert_eq!(parse("2.5"), Value::FloatLiteral(2.5));
        assert_eq!(parse("1e3"), Value::FloatLiteral(1000.0));
        assert_eq!(parse("1_000"), Value::IntegerLiteral(1000));
    }

    #[test]
    fn precedence() {
        assert_eq!(
            parse("1 + 2 * 3"),
            binary(
                BinaryOperator::Addition,
                Value::IntegerLiteral(1),
                binary(
                    BinaryOperator::Multiplication,
                    Value::IntegerLiteral(2),
                    Value::IntegerLiteral(3)
                )
            )
        );
    }

    #[test]
    fn power_is_right_associative_and_binds_over_negation() {
        assert_eq!(
            parse("-2 ** 2"),
            Value::UnaryOperation {
                operator: UnaryOperator::Negation,
                operand: Box::new(binary(
                    BinaryOperator::Power,
                    Value::IntegerLiteral(2),
                    Value::IntegerLiteral(2)
                )),
            }
        );
        assert_eq!(
            parse("2 ** 3 ** 2"),
            binary(
                BinaryOperator::Power,
                Value::IntegerLiteral(2),
                binary(
                    BinaryOperator::Power,
                    Value::IntegerLiteral(3),
                    Value::IntegerLiteral(2)
                )
            )
        );
    }

    #[test]
    fn not_in_and_not() {
        assert_eq!(
            parse("a not in b"),
            binary(
                BinaryOperator::NotIn,
                Value::VariableReference("a".into()),
                Value::VariableReference("b".into())
            )
        );
        assert!(matches!(
            parse("not a == b"),
            Value::UnaryOperation {
                operator: UnaryOperator::LogicalNot,
                ..
            }
        ));
    }

    #[test]
    fn conditional_expression() {
        assert_eq!(
            parse("'y' if ok else 'n'"),
            Value::Conditional {
                condition: Box::new(Value::VariableReference("ok".into())),
                true_branch: Box::new(Value::StringLiteral("y".into())),
                false_branch: Box::new(Value::StringLiteral("n".into())),
            }
        );
    }

    #[test]
    fn calls_methods_and_indexing() {
        assert_eq!(
            parse("range(1, 3)"),
            Value::Call {
                function: "range".into(),
                arguments: vec![Value::IntegerLiteral(1), Value::IntegerLiteral(3)],
            }
        );
        assert!(matches!(
            parse("x.items()"),
            Value::MethodCall { ref method, .. } if method == "items"
        ));
        assert!(matches!(parse("params['v']"), Value::Index { .. }));
    }

    #[test]
    fn displays() {
        assert_eq!(parse("()"), Value::Tuple(vec![]));
        assert_eq!(parse("(1,)"), Value::Tuple(vec![Value::IntegerLiteral(1)]));
        assert_eq!(parse("(1)"), Value::IntegerLiteral(1));
        let pair = vec![Value::IntegerLiteral(1), Value::IntegerLiteral(2)];
        assert_eq!(parse("1, 2"), Value::Tuple(pair.clone()));
        assert_eq!(parse("[1, 2,]"), Value::List(pair));
        assert_eq!(
            parse("{'a': 1}"),
            Value::Dict(vec![(Value::StringLiteral("a".into()), Value::IntegerLiteral(1))])
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_expression("1 +", 3, 0..0, 0).is_err());
        assert!(parse_expression("f(1", 3, 0..0, 0).is_err());
        assert!(parse_expression("a.b", 3, 0..0, 0).is_err());
        assert!(parse_expression("lambda: 1", 3, 0..0, 0).is_err());
        assert!(parse_expression("1 2", 3, 0..0, 0).is_err());
        let err = parse_expression("$", 7, 0..0, 0).unwrap_err();
        assert_eq!(err.line, 7);
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let err = parse_expression(&deep, 4, 0..0, 0).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("nested too deeply"));

        let chain = vec!["1"; 10_000].join(" + ");
        assert!(parse_expression(&chain, 1, 0..0, 0).is_err());
        assert!(parse_expression(&"-".repeat(10_000), 1, 0..0, 0).is_err());

        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&shallow), Value::IntegerLiteral(1));
        let sum = vec!["1"; 50].join(" + ");
        assert!(parse_expression(&sum, 1, 0..0, 0).is_ok());
    }

    #[test]
    fn target_nesting_is_bounded() {
        let deep = format!("{}a{}", "(".repeat(10_000), ")".repeat(10_000));
        let mut parser = ExprParser::from_source(&deep, false, 1, 0..0, 0).unwrap();
        assert!(parser.parse_target().is_err());
    }
}
