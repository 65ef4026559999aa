use serde::Serialize;

/// How an upstream phase hands its rows to the downstream phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionInfo {
    /// Every downstream node receives all rows.
    #[default]
    Broadcast,
    /// Rows stay on the node that produced them.
    SameNode,
}
