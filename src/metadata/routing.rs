use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// node id -> index name -> shard ids
pub type Locations = BTreeMap<String, BTreeMap<String, Vec<u32>>>;

/// Resolved placement of the shards a collect phase reads.
///
/// All levels are ordered, so iterating a routing is deterministic. Tables that
/// are not sharded are represented by a node entry whose shard list is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Routing {
    pub locations: Locations,
}

impl Routing {
    pub fn new(locations: Locations) -> Self {
        Self { locations }
    }

    /// Routes nowhere; the phase produces no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_table_on_single_node(table_fqn: &str, node_id: &str) -> Self {
        let mut indices = BTreeMap::new();
        indices.insert(table_fqn.to_string(), vec![]);
        let mut locations = BTreeMap::new();
        locations.insert(node_id.to_string(), indices);
        Self { locations }
    }

    pub fn for_table_on_all_nodes<'a>(table_fqn: &str, node_ids: impl IntoIterator<Item = &'a str>) -> Self {
        let locations = node_ids.into_iter()
            .map(|node| {
                let mut indices = BTreeMap::new();
                indices.insert(table_fqn.to_string(), vec![]);
                (node.to_string(), indices)
            })
            .collect();
        Self { locations }
    }

    pub fn nodes(&self) -> BTreeSet<String> {
        self.locations.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn num_shards(&self) -> usize {
        self.locations.values()
            .flat_map(|indices| indices.values())
            .map(Vec::len)
            .sum()
    }

    /// Shards of `index` located on `node_id`.
    pub fn shards(&self, node_id: &str, index: &str) -> &[u32] {
        self.locations.get(node_id)
            .and_then(|indices| indices.get(index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
