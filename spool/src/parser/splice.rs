use std::fmt;

/// Character toggling between literal text and embedded expressions.
pub const SPLICE_DELIMITER: char = '`';

/// A piece of a literal line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Expression(&'a str),
}

/// A delimiter was opened and never closed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnbalancedSplice {
    /// 1-based character column of the unmatched delimiter.
    pub column: usize,
}

impl fmt::Display for UnbalancedSplice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unbalanced '{}' at column {}: embedded expression is never closed",
            SPLICE_DELIMITER, self.column
        )
    }
}

/// Split a literal line on the splice delimiter. Segments alternate,
/// starting with literal text, so the result always has odd length.
pub fn split_splices(text: &str) -> Result<Vec<Segment<'_>>, UnbalancedSplice> {
    let pieces: Vec<&str> = text.split(SPLICE_DELIMITER).collect();
    if pieces.len() % 2 == 0 {
        let column = text
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == SPLICE_DELIMITER)
            .map(|(i, _)| i + 1)
            .last()
            .unwrap_or_default();
        return Err(UnbalancedSplice { column });
    }
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            if i % 2 == 0 {
                Segment::Literal(piece)
            } else {
                Segment::Expression(piece)
            }
        })
        .collect())
}
