use crate::analyzer::Literal;

/// A positional row as streamed between phases; column `i` is `InputColumn(i)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub Vec<Literal>);

impl Row {
    pub fn get(&self, idx: usize) -> Option<&Literal> { self.0.get(idx) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<Literal>> for Row {
    fn from(values: Vec<Literal>) -> Self { Row(values) }
}
