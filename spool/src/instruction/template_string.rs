use crate::instruction::value::Value;

/// A literal output line split on the splice delimiter.
/// Literal parts are emitted as-is, expression parts are evaluated and
/// rendered in their place.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateString {
    pub parts: Vec<TemplateStringPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateStringPart {
    /// Literal text content.
    Literal(String),
    /// An embedded expression to be evaluated and rendered.
    Expression(Value),
}

impl TemplateString {
    pub fn literal(s: impl Into<String>) -> Self {
        TemplateString {
            parts: vec![TemplateStringPart::Literal(s.into())],
        }
    }

    pub fn is_literal(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p, TemplateStringPart::Literal(_)))
    }
}
