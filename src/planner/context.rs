use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;
use uuid::Uuid;

use crate::{
    analyzer::{Literal, QuerySpec, Symbol, WhereClause},
    error::{PlannerError, PlannerResult},
    metadata::{ClusterState, Routing, RoutingProvider, RowGranularity, TableIdent, TableInfo},
    planner::{ExecutionPhases, Limits, PlannerConfig},
};

/// Who runs the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user: String,
    pub default_schema: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self { user: "crate".to_string(), default_schema: "doc".to_string() }
    }
}

impl SessionContext {
    pub fn new(user: &str, default_schema: &str) -> Self {
        Self { user: user.to_string(), default_schema: default_schema.to_string() }
    }
}

type RoutingKey = (TableIdent, Option<BTreeSet<String>>, Vec<String>);

/// Mutable state of one planning call.
///
/// Owns the job id, the phase id counter and the per-query routing provider,
/// and borrows the cluster snapshot the plan is computed against.
pub struct PlannerContext<'a> {
    job_id: Uuid,
    handler_node: String,
    cluster_state: &'a ClusterState,
    routing_provider: RoutingProvider,
    session: SessionContext,
    params: Vec<Literal>,
    config: PlannerConfig,
    next_phase_id: u32,
    routing_cache: HashMap<RoutingKey, Routing>,
}

impl<'a> PlannerContext<'a> {
    /// The local node of `cluster_state` acts as handler.
    pub fn new(cluster_state: &'a ClusterState, config: PlannerConfig, seed: i32) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            handler_node: cluster_state.nodes.local_node_id().to_string(),
            cluster_state,
            routing_provider: RoutingProvider::new(seed, config.awareness_attributes.clone()),
            session: SessionContext::default(),
            params: vec![],
            config,
            next_phase_id: 0,
            routing_cache: HashMap::new(),
        }
    }

    pub fn with_job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = session;
        self
    }

    /// Values bound to `$1`, `$2`, ...
    pub fn with_params(mut self, params: Vec<Literal>) -> Self {
        self.params = params;
        self
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn handler_node(&self) -> &str {
        &self.handler_node
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn next_execution_phase_id(&mut self) -> u32 {
        let id = self.next_phase_id;
        self.next_phase_id += 1;
        id
    }

    pub fn executes_on_handler(&self, node_ids: &BTreeSet<String>) -> bool {
        ExecutionPhases::executes_on_handler(&self.handler_node, node_ids)
    }

    /// Routing for reading `table` filtered by `where_clause`.
    ///
    /// Repeated calls for the same table and routing inputs return the routing
    /// computed first.
    pub fn allocate_routing(&mut self, table: &TableInfo, where_clause: &WhereClause) -> PlannerResult<Routing> {
        if where_clause.no_match {
            return Ok(Routing::empty());
        }
        let key: RoutingKey = (table.ident.clone(), where_clause.routing_values.clone(), where_clause.partitions.clone());
        if let Some(routing) = self.routing_cache.get(&key) {
            trace!(table = %table.ident, "routing cache hit");
            return Ok(routing.clone());
        }

        let routing = match table.row_granularity {
            RowGranularity::Cluster => {
                self.routing_provider.for_random_master_or_data_node(&table.ident, &self.cluster_state.nodes)?
            }
            RowGranularity::Node => {
                Routing::for_table_on_all_nodes(&table.ident.fqn(), self.cluster_state.nodes.node_ids())
            }
            RowGranularity::Shard | RowGranularity::Doc => {
                let indices: &[String] = if where_clause.partitions.is_empty() {
                    &table.concrete_indices
                } else {
                    &where_clause.partitions
                };
                let mut routing_values = BTreeMap::new();
                if let Some(values) = &where_clause.routing_values {
                    for index in indices {
                        routing_values.insert(index.clone(), values.clone());
                    }
                }
                self.routing_provider.for_indices(
                    self.cluster_state,
                    indices,
                    &routing_values,
                    self.config.ignore_missing_shards,
                )?
            }
        };
        self.routing_cache.insert(key, routing.clone());
        Ok(routing)
    }

    /// Evaluates a LIMIT/OFFSET symbol. `NULL` means "not set".
    pub fn to_integer(&self, symbol: &Symbol) -> PlannerResult<Option<u64>> {
        let literal = match symbol {
            Symbol::Literal(literal) => literal,
            Symbol::Parameter(idx) => self.params.get(*idx).ok_or(PlannerError::MissingParameter(*idx + 1))?,
            other => return Err(PlannerError::InvalidLimit(format!("{} is not a constant", other))),
        };
        match literal {
            Literal::Null => Ok(None),
            Literal::Int(value) => u64::try_from(*value)
                .map(Some)
                .map_err(|_| PlannerError::InvalidLimit(format!("{} is negative", value))),
            other => Err(PlannerError::InvalidLimit(format!("{} is not an integer", other))),
        }
    }

    /// Limit and offset of `spec`; a missing limit is unlimited, a missing
    /// offset is zero.
    pub fn limits(&self, spec: &QuerySpec) -> PlannerResult<Limits> {
        self.resolve_limits(spec.limit.as_ref(), spec.offset.as_ref())
    }

    pub fn resolve_limits(&self, limit: Option<&Symbol>, offset: Option<&Symbol>) -> PlannerResult<Limits> {
        let limit = match limit {
            Some(symbol) => self.to_integer(symbol)?,
            None => None,
        };
        let offset = match offset {
            Some(symbol) => self.to_integer(symbol)?.unwrap_or(0),
            None => 0,
        };
        Ok(Limits::new(limit, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DiscoveryNode, DiscoveryNodes, IndexMetadata, IndexRoutingTable, ShardState};

    fn state() -> ClusterState {
        let nodes = DiscoveryNodes::new("n1")
            .add(DiscoveryNode::data("n1"))
            .add(DiscoveryNode::data("n2"));
        let routing = IndexRoutingTable::new("t")
            .add_started(0, "n1", true)
            .add_started(1, "n2", true);
        let partition = IndexRoutingTable::new("p1").add_started(0, "n2", true);
        ClusterState::new(nodes)
            .with_index(IndexMetadata::new("t", 2), routing)
            .with_index(IndexMetadata::new("p1", 1), partition)
    }

    #[test]
    fn phase_ids_are_monotonic() {
        let state = state();
        let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 1);
        let ids: Vec<u32> = (0..4).map(|_| ctx.next_execution_phase_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(ctx.handler_node(), "n1");
    }

    #[test]
    fn limits_resolve_literals_and_parameters() {
        let state = state();
        let ctx = PlannerContext::new(&state, PlannerConfig::new(), 1)
            .with_params(vec![Literal::Int(20), Literal::Null]);

        let spec = QuerySpec::new(vec![]).with_limit_symbol(Symbol::Parameter(0)).with_offset(3);
        assert_eq!(ctx.limits(&spec).unwrap(), Limits::new(Some(20), 3));

        let spec = QuerySpec::new(vec![]).with_limit_symbol(Symbol::Parameter(1));
        assert_eq!(ctx.limits(&spec).unwrap(), Limits::unbounded());

        let spec = QuerySpec::new(vec![]).with_limit(5).with_offset_symbol(Symbol::Parameter(0));
        assert_eq!(ctx.limits(&spec).unwrap(), Limits::new(Some(5), 20));

        let spec = QuerySpec::new(vec![]).with_limit_symbol(Symbol::Parameter(2));
        assert_eq!(ctx.limits(&spec).unwrap_err(), PlannerError::MissingParameter(3));

        let spec = QuerySpec::new(vec![]).with_limit(-1);
        assert!(matches!(ctx.limits(&spec).unwrap_err(), PlannerError::InvalidLimit(_)));

        let spec = QuerySpec::new(vec![]).with_limit_symbol(Symbol::Literal(Literal::String("x".into())));
        assert!(matches!(ctx.limits(&spec).unwrap_err(), PlannerError::InvalidLimit(_)));
    }

    #[test]
    fn routing_is_cached_per_table_and_routing_values() {
        let state = state();
        let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 5);
        let table = TableInfo::doc_table("doc", "t");

        let first = ctx.allocate_routing(&table, &WhereClause::match_all()).unwrap();
        let second = ctx.allocate_routing(&table, &WhereClause::match_all()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.num_shards(), 2);
        assert_eq!(ctx.routing_cache.len(), 1);

        let routed = ctx.allocate_routing(&table, &WhereClause::match_all().with_routing_values(["1"])).unwrap();
        assert_eq!(routed.num_shards(), 1);
        assert_eq!(ctx.routing_cache.len(), 2);
    }

    #[test]
    fn no_match_routes_nowhere() {
        let state = state();
        let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 5);
        let routing = ctx.allocate_routing(&TableInfo::doc_table("doc", "t"), &WhereClause::no_match()).unwrap();
        assert!(routing.is_empty());
        assert!(ctx.executes_on_handler(&routing.nodes()));
    }

    #[test]
    fn partitions_replace_concrete_indices() {
        let state = state();
        let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 5);
        let table = TableInfo::doc_table("doc", "parted").with_partitions(&["p1", "p2"]);

        // p2 is not in the cluster state, so only a pruned routing succeeds
        let err = ctx.allocate_routing(&table, &WhereClause::match_all()).unwrap_err();
        assert_eq!(err, PlannerError::IndexNotFound("p2".into()));

        let routing = ctx.allocate_routing(&table, &WhereClause::match_all().with_partitions(["p1"])).unwrap();
        assert_eq!(routing.shards("n2", "p1"), &[0]);
    }

    #[test]
    fn metadata_tables_route_by_granularity() {
        let state = state();
        let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 5);

        let cluster = ctx.allocate_routing(&TableInfo::cluster_table("sys", "cluster"), &WhereClause::match_all()).unwrap();
        assert_eq!(cluster.nodes().len(), 1);

        let nodes = ctx.allocate_routing(&TableInfo::node_table("sys", "nodes"), &WhereClause::match_all()).unwrap();
        assert_eq!(nodes.nodes().len(), 2);
        assert_eq!(nodes.num_shards(), 0);
    }

    #[test]
    fn missing_shards_follow_config() {
        let nodes = DiscoveryNodes::new("n1").add(DiscoveryNode::data("n1"));
        let routing = IndexRoutingTable::new("t")
            .add_started(0, "n1", true)
            .add_copy(1, None, true, ShardState::Unassigned);
        let state = ClusterState::new(nodes).with_index(IndexMetadata::new("t", 2), routing);
        let table = TableInfo::doc_table("doc", "t");

        let mut strict = PlannerContext::new(&state, PlannerConfig::new(), 1);
        assert!(strict.allocate_routing(&table, &WhereClause::match_all()).unwrap_err().is_retryable());

        let mut lenient = PlannerContext::new(&state, PlannerConfig::ignoring_missing_shards(), 1);
        assert_eq!(lenient.allocate_routing(&table, &WhereClause::match_all()).unwrap().num_shards(), 1);
    }
}
