use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    analyzer::{OrderBy, Symbol, WhereClause},
    metadata::{Routing, RowGranularity},
    planner::{DistributionInfo, Projection},
};

/// Common view of every physical step of a plan.
pub trait ExecutionPhase {
    fn phase_id(&self) -> u32;
    fn name(&self) -> &str;
    fn node_ids(&self) -> BTreeSet<String>;
}

/// A phase whose rows flow to a downstream phase.
pub trait UpstreamPhase: ExecutionPhase {
    fn distribution(&self) -> DistributionInfo;
    fn set_distribution(&mut self, distribution: DistributionInfo);
}

/// Reads rows from the shards (or nodes) named by its routing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedCollectPhase {
    pub job_id: Uuid,
    pub phase_id: u32,
    pub name: String,
    pub routing: Routing,
    pub max_row_granularity: RowGranularity,
    pub to_collect: Vec<Symbol>,
    pub projections: Vec<Projection>,
    pub where_clause: WhereClause,
    pub distribution: DistributionInfo,
    pub order_by: Option<OrderBy>,
    pub user: String,
}

impl RoutedCollectPhase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: Uuid,
        phase_id: u32,
        routing: Routing,
        max_row_granularity: RowGranularity,
        to_collect: Vec<Symbol>,
        projections: Vec<Projection>,
        where_clause: WhereClause,
        user: &str,
    ) -> Self {
        Self {
            job_id,
            phase_id,
            name: "collect".to_string(),
            routing,
            max_row_granularity,
            to_collect,
            projections,
            where_clause,
            distribution: DistributionInfo::Broadcast,
            order_by: None,
            user: user.to_string(),
        }
    }

    /// Requests shard-local iteration in this order.
    pub fn with_order_by(mut self, order_by: Option<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }
}

impl ExecutionPhase for RoutedCollectPhase {
    fn phase_id(&self) -> u32 { self.phase_id }
    fn name(&self) -> &str { &self.name }
    fn node_ids(&self) -> BTreeSet<String> { self.routing.nodes() }
}

impl UpstreamPhase for RoutedCollectPhase {
    fn distribution(&self) -> DistributionInfo { self.distribution }
    fn set_distribution(&mut self, distribution: DistributionInfo) { self.distribution = distribution; }
}

/// Gathers the results of `num_upstreams` upstream nodes and applies the
/// final projections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergePhase {
    pub job_id: Uuid,
    pub phase_id: u32,
    pub name: String,
    pub num_upstreams: usize,
    pub node_ids: Vec<String>,
    pub input_columns: Vec<Symbol>,
    pub projections: Vec<Projection>,
    pub distribution: DistributionInfo,
}

impl MergePhase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: Uuid,
        phase_id: u32,
        name: &str,
        num_upstreams: usize,
        node_ids: Vec<String>,
        input_columns: Vec<Symbol>,
        projections: Vec<Projection>,
        distribution: DistributionInfo,
    ) -> Self {
        Self {
            job_id,
            phase_id,
            name: name.to_string(),
            num_upstreams,
            node_ids,
            input_columns,
            projections,
            distribution,
        }
    }
}

impl ExecutionPhase for MergePhase {
    fn phase_id(&self) -> u32 { self.phase_id }
    fn name(&self) -> &str { &self.name }
    fn node_ids(&self) -> BTreeSet<String> { self.node_ids.iter().cloned().collect() }
}

/// Counts matching documents per shard without fetching them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountPhase {
    pub job_id: Uuid,
    pub phase_id: u32,
    pub routing: Routing,
    pub where_clause: WhereClause,
    pub distribution: DistributionInfo,
}

impl CountPhase {
    pub fn new(job_id: Uuid, phase_id: u32, routing: Routing, where_clause: WhereClause) -> Self {
        Self { job_id, phase_id, routing, where_clause, distribution: DistributionInfo::SameNode }
    }
}

impl ExecutionPhase for CountPhase {
    fn phase_id(&self) -> u32 { self.phase_id }
    fn name(&self) -> &str { "count" }
    fn node_ids(&self) -> BTreeSet<String> { self.routing.nodes() }
}

impl UpstreamPhase for CountPhase {
    fn distribution(&self) -> DistributionInfo { self.distribution }
    fn set_distribution(&mut self, distribution: DistributionInfo) { self.distribution = distribution; }
}

pub struct ExecutionPhases;

impl ExecutionPhases {
    /// True when a phase running on `node_ids` produces its rows on the
    /// handler itself. An empty node set means nothing is collected remotely.
    pub fn executes_on_handler(handler_node: &str, node_ids: &BTreeSet<String>) -> bool {
        match node_ids.len() {
            0 => true,
            1 => node_ids.contains(handler_node),
            _ => false,
        }
    }
}
