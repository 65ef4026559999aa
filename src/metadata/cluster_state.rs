use std::collections::BTreeMap;

use serde::Serialize;

use crate::metadata::RoutingHashFunction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryNode {
    pub id: String,
    pub master: bool,
    pub data: bool,
}

impl DiscoveryNode {
    pub fn new(id: &str, master: bool, data: bool) -> Self {
        Self { id: id.to_string(), master, data }
    }

    pub fn data(id: &str) -> Self {
        Self::new(id, false, true)
    }

    pub fn master(id: &str) -> Self {
        Self::new(id, true, false)
    }

    /// A node that neither stores data nor is master eligible.
    pub fn client(id: &str) -> Self {
        Self::new(id, false, false)
    }

    pub fn is_master_or_data(&self) -> bool {
        self.master || self.data
    }
}

/// Cluster membership as seen from the local node. Keyed by node id so every
/// iteration is ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryNodes {
    local_node_id: String,
    nodes: BTreeMap<String, DiscoveryNode>,
}

impl DiscoveryNodes {
    pub fn new(local_node_id: &str) -> Self {
        Self { local_node_id: local_node_id.to_string(), nodes: BTreeMap::new() }
    }

    pub fn add(mut self, node: DiscoveryNode) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn local_node_id(&self) -> &str {
        &self.local_node_id
    }

    pub fn local_node(&self) -> Option<&DiscoveryNode> {
        self.nodes.get(&self.local_node_id)
    }

    pub fn get(&self, id: &str) -> Option<&DiscoveryNode> {
        self.nodes.get(id)
    }

    /// Master-eligible and data nodes, ordered by id.
    pub fn master_and_data_nodes(&self) -> Vec<&DiscoveryNode> {
        self.nodes.values().filter(|n| n.is_master_or_data()).collect()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardState {
    Unassigned,
    Initializing,
    Started,
    Relocating,
}

/// One copy (primary or replica) of a shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ShardRouting {
    pub index: String,
    pub shard_id: u32,
    pub node_id: Option<String>,
    pub primary: bool,
    pub state: ShardState,
}

impl ShardRouting {
    pub fn is_active(&self) -> bool {
        matches!(self.state, ShardState::Started | ShardState::Relocating)
    }

    pub fn is_initializing(&self) -> bool {
        self.state == ShardState::Initializing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexShardRoutingTable {
    pub index: String,
    pub shard_id: u32,
    pub copies: Vec<ShardRouting>,
}

impl IndexShardRoutingTable {
    /// Active copies rotated by `seed`, followed by initializing copies.
    ///
    /// The same seed always starts at the same active copy, so every request of
    /// one query lands on the same replica.
    pub fn active_initializing_shards(&self, seed: i32) -> Vec<&ShardRouting> {
        let active: Vec<&ShardRouting> = self.copies.iter()
            .filter(|c| c.is_active() && c.node_id.is_some())
            .collect();
        let mut out = Vec::with_capacity(self.copies.len());
        if !active.is_empty() {
            let start = seed.rem_euclid(active.len() as i32) as usize;
            out.extend(active.iter().cycle().skip(start).take(active.len()).copied());
        }
        out.extend(self.copies.iter().filter(|c| c.is_initializing() && c.node_id.is_some()));
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRoutingTable {
    pub index: String,
    shards: BTreeMap<u32, IndexShardRoutingTable>,
}

impl IndexRoutingTable {
    pub fn new(index: &str) -> Self {
        Self { index: index.to_string(), shards: BTreeMap::new() }
    }

    /// Adds a copy of `shard_id`; `node_id` is `None` for unassigned copies.
    pub fn add_copy(mut self, shard_id: u32, node_id: Option<&str>, primary: bool, state: ShardState) -> Self {
        let index = self.index.clone();
        let table = self.shards.entry(shard_id).or_insert_with(|| IndexShardRoutingTable {
            index: index.clone(),
            shard_id,
            copies: vec![],
        });
        table.copies.push(ShardRouting {
            index,
            shard_id,
            node_id: node_id.map(str::to_string),
            primary,
            state,
        });
        self
    }

    pub fn add_started(self, shard_id: u32, node_id: &str, primary: bool) -> Self {
        self.add_copy(shard_id, Some(node_id), primary, ShardState::Started)
    }

    pub fn shard(&self, shard_id: u32) -> Option<&IndexShardRoutingTable> {
        self.shards.get(&shard_id)
    }

    pub fn shards(&self) -> impl Iterator<Item = &IndexShardRoutingTable> {
        self.shards.values()
    }
}

/// How a hashed routing value is reduced to a shard id.
///
/// Fixed per index at creation time; indices created by older versions keep
/// the legacy reduction so existing documents stay addressable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardIdPolicy {
    /// `floor_mod(hash, routing_num_shards) / routing_factor`; never negative.
    #[default]
    FloorMod,
    /// `abs(hash % routing_num_shards) / routing_factor`.
    LegacyAbsMod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexMetadata {
    name: String,
    number_of_shards: u32,
    /// Shard count used for hashing; larger than `number_of_shards` after a shrink.
    routing_num_shards: u32,
    routing_partition_size: u32,
    hash_function: RoutingHashFunction,
    shard_id_policy: ShardIdPolicy,
}

impl IndexMetadata {
    pub fn new(name: &str, number_of_shards: u32) -> Self {
        assert!(number_of_shards > 0, "an index needs at least one shard");
        Self {
            name: name.to_string(),
            number_of_shards,
            routing_num_shards: number_of_shards,
            routing_partition_size: 1,
            hash_function: RoutingHashFunction::default(),
            shard_id_policy: ShardIdPolicy::default(),
        }
    }

    pub fn with_routing_num_shards(mut self, routing_num_shards: u32) -> Self {
        assert!(
            routing_num_shards >= self.number_of_shards && routing_num_shards % self.number_of_shards == 0,
            "routing_num_shards must be a multiple of number_of_shards"
        );
        self.routing_num_shards = routing_num_shards;
        self
    }

    pub fn with_routing_partition_size(mut self, size: u32) -> Self {
        assert!(size > 0, "routing partition size must be positive");
        self.routing_partition_size = size;
        self
    }

    pub fn with_hash_function(mut self, hash_function: RoutingHashFunction) -> Self {
        self.hash_function = hash_function;
        self
    }

    pub fn with_shard_id_policy(mut self, policy: ShardIdPolicy) -> Self {
        self.shard_id_policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_of_shards(&self) -> u32 {
        self.number_of_shards
    }

    pub fn routing_num_shards(&self) -> u32 {
        self.routing_num_shards
    }

    pub fn routing_partition_size(&self) -> u32 {
        self.routing_partition_size
    }

    pub fn hash_function(&self) -> RoutingHashFunction {
        self.hash_function
    }

    pub fn shard_id_policy(&self) -> ShardIdPolicy {
        self.shard_id_policy
    }

    /// Number of routing slots folded into one physical shard.
    pub fn routing_factor(&self) -> u32 {
        self.routing_num_shards / self.number_of_shards
    }

    /// Shard owning documents routed by `routing` at `partition_offset`.
    pub fn shard_id(&self, routing: &str, partition_offset: u32) -> u32 {
        let hash = self.hash_function.hash(routing).wrapping_add(partition_offset as i32);
        self.shard_id_for_hash(hash)
    }

    pub fn shard_id_for_hash(&self, hash: i32) -> u32 {
        let num = self.routing_num_shards as i64;
        let hash = hash as i64;
        let slot = match self.shard_id_policy {
            ShardIdPolicy::FloorMod => hash.rem_euclid(num),
            ShardIdPolicy::LegacyAbsMod => (hash % num).abs(),
        };
        (slot / self.routing_factor() as i64) as u32
    }
}

/// Read-only snapshot of the cluster used for one planning call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterState {
    pub nodes: DiscoveryNodes,
    routing_table: BTreeMap<String, IndexRoutingTable>,
    metadata: BTreeMap<String, IndexMetadata>,
}

impl ClusterState {
    pub fn new(nodes: DiscoveryNodes) -> Self {
        Self { nodes, routing_table: BTreeMap::new(), metadata: BTreeMap::new() }
    }

    pub fn with_index(mut self, metadata: IndexMetadata, routing: IndexRoutingTable) -> Self {
        self.routing_table.insert(routing.index.clone(), routing);
        self.metadata.insert(metadata.name().to_string(), metadata);
        self
    }

    pub fn index_routing_table(&self, index: &str) -> Option<&IndexRoutingTable> {
        self.routing_table.get(index)
    }

    pub fn index_metadata(&self, index: &str) -> Option<&IndexMetadata> {
        self.metadata.get(index)
    }
}
