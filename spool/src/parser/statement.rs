use std::ops::Range;

use crate::instruction::value::{BinaryOperator, Value};
use crate::instruction::{Statement, Target};
use crate::parser::error::ParseError;
use crate::parser::expression::{ExprParser, Token, tokenize};

/// Parse the body of a bare directive into statements.
/// Statements are separated by `;` or by line breaks outside brackets.
pub fn parse_statements(
    text: &str,
    line: usize,
    span: Range<usize>,
    file_id: usize,
) -> Result<Vec<Statement>, ParseError> {
    let tokens = tokenize(text, true)
        .map_err(|msg| ParseError::generation(msg, line, span.clone(), file_id))?;

    let mut statements = Vec::new();
    for group in tokens.split(|t| matches!(t, Token::Newline | Token::Semicolon)) {
        if group.is_empty() {
            continue;
        }
        statements.push(parse_statement(group.to_vec(), line, span.clone(), file_id)?);
    }
    if statements.is_empty() {
        statements.push(Statement::Pass);
    }
    Ok(statements)
}

fn parse_statement(
    tokens: Vec<Token>,
    line: usize,
    span: Range<usize>,
    file_id: usize,
) -> Result<Statement, ParseError> {
    let error = |msg: String| ParseError::generation(msg, line, span.clone(), file_id);

    match tokens.as_slice() {
        [Token::Pass] => return Ok(Statement::Pass),
        [Token::Reserved(kw), ..] => {
            return Err(error(format!("unsupported statement '{}'", kw)).with_note(
                "only assignments, 'pass' and expressions may appear in a bare directive",
            ));
        }
        _ => {}
    }

    if let [Token::Ident(name), op, rest @ ..] = tokens.as_slice()
        && let Some(operator) = augmented_operator(op)
    {
        let mut parser = ExprParser::new(rest.to_vec(), line, span.clone(), file_id);
        let value = parser.parse_expr_list()?;
        parser.expect_end()?;
        return Ok(Statement::AugmentedAssignment {
            variable: name.clone(),
            operator,
            value,
        });
    }

    let Some(eq) = top_level_assignment(&tokens) else {
        let mut parser = ExprParser::new(tokens, line, span, file_id);
        let value = parser.parse_expr_list()?;
        parser.expect_end()?;
        return Ok(Statement::Expression(value));
    };

    let mut rhs = ExprParser::new(tokens[eq + 1..].to_vec(), line, span.clone(), file_id);
    let value = rhs.parse_expr_list()?;
    rhs.expect_end()?;

    let lhs = &tokens[..eq];
    if let [Token::Ident(variable), Token::LBracket, key @ .., Token::RBracket] = lhs {
        let mut parser = ExprParser::new(key.to_vec(), line, span.clone(), file_id);
        let key = parser.parse_expr_list()?;
        parser.expect_end()?;
        return Ok(Statement::IndexAssignment {
            variable: variable.clone(),
            key,
            value,
        });
    }

    let mut parser = ExprParser::new(lhs.to_vec(), line, span, file_id);
    let target = parser.parse_target()?;
    parser.expect_end()?;
    Ok(Statement::Assignment { target, value })
}

fn augmented_operator(token: &Token) -> Option<BinaryOperator> {
    match token {
        Token::PlusEq => Some(BinaryOperator::Addition),
        Token::MinusEq => Some(BinaryOperator::Subtraction),
        Token::StarEq => Some(BinaryOperator::Multiplication),
        Token::SlashEq => Some(BinaryOperator::Division),
        Token::SlashSlashEq => Some(BinaryOperator::FloorDivision),
        Token::PercentEq => Some(BinaryOperator::Modulo),
        _ => None,
    }
}

/// Index of the first `=` outside brackets.
fn top_level_assignment(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            Token::Eq if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parse a `for` header body: `<target> in <iterable>`.
pub fn parse_for_header(
    text: &str,
    line: usize,
    span: Range<usize>,
    file_id: usize,
) -> Result<(Target, Value), ParseError> {
    let mut parser = ExprParser::from_source(text, false, line, span, file_id)?;
    let target = parser.parse_target()?;
    parser.expect(&Token::In)?;
    let iterable = parser.parse_expr_list()?;
    parser.expect_end()?;
    Ok((target, iterable))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(text: &str) -> Vec<Statement> {
        parse_statements(text, 1, 0..0, 0).unwrap()
    }

    #[test]
    fn simple_assignment() {
        assert_eq!(
            statements("x = 1"),
            vec![Statement::Assignment {
                target: Target::Name("x".into()),
                value: Value::IntegerLiteral(1),
            }]
        );
    }

    #[test]
    fn unpacking_assignment() {
        let parsed = statements("a, b = 1, 2");
        assert!(matches!(
            &parsed[0],
            Statement::Assignment {
                target: Target::Tuple(names),
                value: Value::Tuple(_),
            } if names.len() == 2
        ));
    }

    #[test]
    fn augmented_and_index_assignment() {
        assert_eq!(
            statements("n += 2"),
            vec![Statement::AugmentedAssignment {
                variable: "n".into(),
                operator: BinaryOperator::Addition,
                value: Value::IntegerLiteral(2),
            }]
        );
        assert!(matches!(
            &statements("d['k'] = 3")[0],
            Statement::IndexAssignment { variable, .. } if variable == "d"
        ));
    }

    #[test]
    fn comparison_is_not_assignment() {
        assert!(matches!(&statements("x == 1")[0], Statement::Expression(_)));
        assert!(parse_statements("f(a=1)", 1, 0..0, 0).is_err());
    }

    #[test]
    fn multi_line_statements() {
        let parsed = statements("x = {\n  'a': 100,\n  'b': 200\n}\ny = 2; z = 3");
        assert_eq!(parsed.len(), 3);
        assert!(matches!(
            &parsed[0],
            Statement::Assignment { value: Value::Dict(entries), .. } if entries.len() == 2
        ));
    }

    #[test]
    fn empty_and_pass() {
        assert_eq!(statements(""), vec![Statement::Pass]);
        assert_eq!(statements("pass"), vec![Statement::Pass]);
    }

    #[test]
    fn suites_are_rejected() {
        let err = parse_statements("def f(x):\n    return x", 4, 0..0, 0).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("unsupported statement 'def'"));
        assert!(parse_statements("import os", 1, 0..0, 0).is_err());
    }

    #[test]
    fn for_headers() {
        let (target, iterable) = parse_for_header("k, v in x.items()", 1, 0..0, 0).unwrap();
        assert_eq!(
            target,
            Target::Tuple(vec![Target::Name("k".into()), Target::Name("v".into())])
        );
        assert!(matches!(iterable, Value::MethodCall { .. }));
        assert!(parse_for_header("i range(3)", 1, 0..0, 0).is_err());
        assert!(parse_for_header("1 in y", 1, 0..0, 0).is_err());
    }
}
