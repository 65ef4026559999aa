use std::collections::BTreeSet;

use serde::Serialize;

use crate::analyzer::Symbol;

pub const VERSION_COLUMN: &str = "_version";

/// Analyzed WHERE clause.
///
/// Besides the filter itself, analysis may have extracted the values of the
/// clustered-by column (`routing_values`) and the partitions the filter can
/// match, which the router uses for pruning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WhereClause {
    pub query: Option<Symbol>,
    pub routing_values: Option<BTreeSet<String>>,
    pub partitions: Vec<String>,
    pub no_match: bool,
}

impl WhereClause {
    pub fn match_all() -> Self {
        Self::default()
    }

    /// A filter that is statically known to match nothing.
    pub fn no_match() -> Self {
        Self { no_match: true, ..Self::default() }
    }

    pub fn new(query: Symbol) -> Self {
        Self { query: Some(query), ..Self::default() }
    }

    pub fn with_routing_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routing_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_partitions<I, S>(mut self, partitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partitions = partitions.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_query(&self) -> bool {
        self.query.is_some()
    }

    /// True if the filter pins rows to a `_version`.
    pub fn has_versions(&self) -> bool {
        self.query.as_ref().is_some_and(|q| q.references_column(VERSION_COLUMN))
    }
}

/// HAVING clause; evaluated over aggregation outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HavingClause {
    pub query: Symbol,
}

impl HavingClause {
    pub fn new(query: Symbol) -> Self {
        Self { query }
    }

    pub fn has_versions(&self) -> bool {
        self.query.references_column(VERSION_COLUMN)
    }
}
