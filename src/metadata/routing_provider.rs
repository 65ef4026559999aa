use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

use crate::{
    error::{PlannerError, PlannerResult},
    metadata::{ClusterState, DiscoveryNodes, IndexShardRoutingTable, Locations, Routing, TableIdent},
};

/// Computes routings for one query.
///
/// Every replica choice and every random node pick derives from `seed`, so two
/// providers created with the same seed produce identical routings for the same
/// cluster state. A provider is owned by a single planner context and never
/// shared between queries.
#[derive(Debug, Clone)]
pub struct RoutingProvider {
    seed: i32,
    awareness_attributes: Vec<String>,
    rng: ChaCha8Rng,
}

impl RoutingProvider {
    pub fn new(seed: i32, awareness_attributes: Vec<String>) -> Self {
        Self {
            seed,
            awareness_attributes,
            rng: ChaCha8Rng::seed_from_u64(seed as u32 as u64),
        }
    }

    /// Routing for tables served by any single master or data node.
    ///
    /// The local node is preferred; otherwise one node is drawn from the id
    /// ordered master/data nodes.
    pub fn for_random_master_or_data_node(&mut self, ident: &TableIdent, nodes: &DiscoveryNodes) -> PlannerResult<Routing> {
        if let Some(local) = nodes.local_node() {
            if local.is_master_or_data() {
                return Ok(Routing::for_table_on_single_node(&ident.fqn(), &local.id));
            }
        }
        let candidates = nodes.master_and_data_nodes();
        if candidates.is_empty() {
            return Err(PlannerError::Internal("cluster has no master or data node".into()));
        }
        let idx = self.rng.gen_range(0..candidates.len());
        trace!(table = %ident, node = %candidates[idx].id, "picked random master/data node");
        Ok(Routing::for_table_on_single_node(&ident.fqn(), &candidates[idx].id))
    }

    /// Routing over the shards of `indices`.
    ///
    /// Indices with routing values only target the shards owning those values;
    /// all others target every shard. One copy per shard is chosen. A shard
    /// without an active or initializing copy is skipped when
    /// `ignore_missing_shards` is set and fails the routing otherwise.
    pub fn for_indices(
        &self,
        state: &ClusterState,
        indices: &[String],
        routing_values_by_index: &BTreeMap<String, BTreeSet<String>>,
        ignore_missing_shards: bool,
    ) -> PlannerResult<Routing> {
        if !self.awareness_attributes.is_empty() {
            return Err(PlannerError::Unsupported(format!(
                "shard allocation awareness routing ({})",
                self.awareness_attributes.join(", ")
            )));
        }

        let shards = Self::targeted_shards(state, indices, routing_values_by_index)?;
        let mut locations = Locations::new();
        for shard in shards {
            let copies = shard.active_initializing_shards(self.seed);
            let Some(copy) = copies.first() else {
                if ignore_missing_shards {
                    warn!(index = %shard.index, shard = shard.shard_id, "skipping shard without an active copy");
                    continue;
                }
                return Err(PlannerError::ShardsUnavailable { index: shard.index.clone(), shard: shard.shard_id });
            };
            // active_initializing_shards only yields assigned copies
            let Some(node_id) = copy.node_id.as_ref() else { continue };
            locations.entry(node_id.clone())
                .or_default()
                .entry(copy.index.clone())
                .or_default()
                .push(copy.shard_id);
        }
        for shard_ids in locations.values_mut().flat_map(|indices| indices.values_mut()) {
            shard_ids.sort_unstable();
        }

        let routing = Routing::new(locations);
        debug!(
            indices = indices.len(),
            nodes = routing.locations.len(),
            shards = routing.num_shards(),
            seed = self.seed,
            "computed routing"
        );
        Ok(routing)
    }

    // Deduplicated, in index order then value order.
    fn targeted_shards<'a>(
        state: &'a ClusterState,
        indices: &[String],
        routing_values_by_index: &BTreeMap<String, BTreeSet<String>>,
    ) -> PlannerResult<IndexSet<&'a IndexShardRoutingTable>> {
        let mut targeted: IndexSet<&IndexShardRoutingTable> = IndexSet::new();
        for index in indices {
            let routing_table = state.index_routing_table(index)
                .ok_or_else(|| PlannerError::IndexNotFound(index.clone()))?;
            let metadata = state.index_metadata(index)
                .ok_or_else(|| PlannerError::IndexNotFound(index.clone()))?;

            match routing_values_by_index.get(index) {
                Some(values) => {
                    for value in values {
                        for offset in 0..metadata.routing_partition_size() {
                            let shard_id = metadata.shard_id(value, offset);
                            let shard = routing_table.shard(shard_id).ok_or_else(|| PlannerError::ShardNotFound {
                                index: index.clone(),
                                shard: shard_id,
                            })?;
                            targeted.insert(shard);
                        }
                    }
                }
                None => targeted.extend(routing_table.shards()),
            }
        }
        Ok(targeted)
    }
}
