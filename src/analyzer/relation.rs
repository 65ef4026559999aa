use std::sync::Arc;

use crate::{analyzer::QuerySpec, metadata::TableInfo};

/// A table together with the query analyzed against it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueriedTable {
    pub table_info: Arc<TableInfo>,
    pub query_spec: QuerySpec,
}

/// The relation a SELECT reads from.
///
/// Only table-backed relations can be collected by this planner; derived
/// relations (subselects, table functions, ...) are reported as unsupported.
#[derive(Debug, Clone, PartialEq)]
pub enum QueriedRelation {
    Table(QueriedTable),
    Derived { name: String, query_spec: QuerySpec },
}

impl QueriedRelation {
    pub fn table(table_info: Arc<TableInfo>, query_spec: QuerySpec) -> Self {
        QueriedRelation::Table(QueriedTable { table_info, query_spec })
    }

    pub fn query_spec(&self) -> &QuerySpec {
        match self {
            QueriedRelation::Table(t) => &t.query_spec,
            QueriedRelation::Derived { query_spec, .. } => query_spec,
        }
    }

    pub fn name(&self) -> String {
        match self {
            QueriedRelation::Table(t) => t.table_info.ident.fqn(),
            QueriedRelation::Derived { name, .. } => name.clone(),
        }
    }

    pub fn as_table(&self) -> Option<&QueriedTable> {
        match self {
            QueriedRelation::Table(t) => Some(t),
            QueriedRelation::Derived { .. } => None,
        }
    }
}
