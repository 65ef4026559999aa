use std::fmt;

use serde::Serialize;

use crate::metadata::RowGranularity;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableIdent {
    pub schema: String,
    pub name: String,
}

impl TableIdent {
    pub fn new(schema: &str, name: &str) -> Self {
        Self { schema: schema.to_string(), name: name.to_string() }
    }

    /// Fully qualified name, `schema.name`.
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Planner view of a table's metadata.
///
/// `concrete_indices` lists the physical indices backing the table (one per
/// partition for partitioned tables).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub ident: TableIdent,
    pub row_granularity: RowGranularity,
    pub clustered_by: Option<String>,
    pub primary_key: Vec<String>,
    pub concrete_indices: Vec<String>,
    pub partitioned: bool,
}

impl TableInfo {
    /// A regular sharded table stored in a single index named after the table.
    pub fn doc_table(schema: &str, name: &str) -> Self {
        Self {
            ident: TableIdent::new(schema, name),
            row_granularity: RowGranularity::Doc,
            clustered_by: None,
            primary_key: vec![],
            concrete_indices: vec![name.to_string()],
            partitioned: false,
        }
    }

    /// A metadata table served by any single master or data node.
    pub fn cluster_table(schema: &str, name: &str) -> Self {
        Self {
            ident: TableIdent::new(schema, name),
            row_granularity: RowGranularity::Cluster,
            clustered_by: None,
            primary_key: vec![],
            concrete_indices: vec![],
            partitioned: false,
        }
    }

    /// A table with one row source per node.
    pub fn node_table(schema: &str, name: &str) -> Self {
        Self { row_granularity: RowGranularity::Node, ..Self::cluster_table(schema, name) }
    }

    pub fn with_clustered_by(mut self, column: &str) -> Self {
        self.clustered_by = Some(column.to_string());
        self
    }

    /// Sets the primary key; a single-column key also clusters the table.
    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        if self.clustered_by.is_none() && self.primary_key.len() == 1 {
            self.clustered_by = Some(self.primary_key[0].clone());
        }
        self
    }

    pub fn with_partitions(mut self, partitions: &[&str]) -> Self {
        self.concrete_indices = partitions.iter().map(|p| p.to_string()).collect();
        self.partitioned = true;
        self
    }

    pub fn is_sharded(&self) -> bool {
        self.row_granularity >= RowGranularity::Shard
    }
}
