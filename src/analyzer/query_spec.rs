use crate::analyzer::{HavingClause, OrderBy, Symbol, WhereClause};

/// The analyzed shape of a single-table SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub outputs: Vec<Symbol>,                // qualified & folded
    pub where_clause: WhereClause,
    pub group_by: Option<Vec<Symbol>>,
    pub having: Option<HavingClause>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Symbol>,
    pub offset: Option<Symbol>,
}

impl QuerySpec {
    pub fn new(outputs: Vec<Symbol>) -> Self {
        Self {
            outputs,
            where_clause: WhereClause::match_all(),
            group_by: None,
            having: None,
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    pub fn with_where(mut self, where_clause: WhereClause) -> Self {
        self.where_clause = where_clause;
        self
    }

    pub fn with_group_by(mut self, keys: Vec<Symbol>) -> Self {
        self.group_by = Some(keys);
        self
    }

    pub fn with_having(mut self, query: Symbol) -> Self {
        self.having = Some(HavingClause::new(query));
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(Symbol::literal_int(limit));
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(Symbol::literal_int(offset));
        self
    }

    pub fn with_limit_symbol(mut self, limit: Symbol) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset_symbol(mut self, offset: Symbol) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Group keys, or an empty slice for ungrouped queries.
    pub fn group_keys(&self) -> &[Symbol] {
        self.group_by.as_deref().unwrap_or(&[])
    }
}
