use serde::Serialize;

use crate::analyzer::Symbol;

/// ORDER BY clause: one entry per sort column.
///
/// `reverse_flags[i]` is true for DESC, `nulls_first[i]` carries the explicit or
/// default NULLS FIRST/LAST decision for column `i`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderBy {
    pub symbols: Vec<Symbol>,
    pub reverse_flags: Vec<bool>,
    pub nulls_first: Vec<bool>,
}

impl OrderBy {
    pub fn new(symbols: Vec<Symbol>, reverse_flags: Vec<bool>, nulls_first: Vec<bool>) -> Self {
        assert_eq!(symbols.len(), reverse_flags.len(), "one reverse flag per order symbol");
        assert_eq!(symbols.len(), nulls_first.len(), "one nulls-first flag per order symbol");
        Self { symbols, reverse_flags, nulls_first }
    }

    /// Ascending, NULLS LAST.
    pub fn asc(symbol: Symbol) -> Self {
        Self::new(vec![symbol], vec![false], vec![false])
    }

    /// Descending, NULLS FIRST (default placement for DESC).
    pub fn desc(symbol: Symbol) -> Self {
        Self::new(vec![symbol], vec![true], vec![true])
    }

    pub fn then(mut self, other: OrderBy) -> Self {
        self.symbols.extend(other.symbols);
        self.reverse_flags.extend(other.reverse_flags);
        self.nulls_first.extend(other.nulls_first);
        self
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
