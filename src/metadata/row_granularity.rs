use serde::Serialize;

/// Scope at which rows of a table live, or at which a projection may run.
///
/// Ordered from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowGranularity {
    Cluster,
    Node,
    Shard,
    Doc,
}
