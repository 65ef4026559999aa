#[cfg(test)]
pub mod fixtures {
    use std::sync::Arc;

    use crate::analyzer::{DataType, QueriedRelation, QuerySpec, Symbol};
    use crate::metadata::{ClusterState, DiscoveryNode, DiscoveryNodes, IndexMetadata, IndexRoutingTable, TableInfo};

    pub const HANDLER: &str = "n1";

    pub fn col(name: &str) -> Symbol {
        Symbol::reference("t", name, DataType::Long)
    }

    pub fn sum(arg: Symbol) -> Symbol {
        Symbol::function("sum", vec![arg])
    }

    pub fn count_star() -> Symbol {
        Symbol::function("count", vec![])
    }

    pub fn data_nodes(count: usize) -> DiscoveryNodes {
        (1..=count).fold(DiscoveryNodes::new(HANDLER), |nodes, i| {
            nodes.add(DiscoveryNode::data(&format!("n{}", i)))
        })
    }

    /// Table `t` with 3 shards on 2 nodes, every shard with a replica on the other node.
    pub fn two_node_cluster() -> ClusterState {
        let routing = IndexRoutingTable::new("t")
            .add_started(0, "n1", true).add_started(0, "n2", false)
            .add_started(1, "n2", true).add_started(1, "n1", false)
            .add_started(2, "n1", true).add_started(2, "n2", false);
        ClusterState::new(data_nodes(2)).with_index(IndexMetadata::new("t", 3), routing)
    }

    /// Table `t` with 4 shards, one primary per node, no replicas.
    pub fn four_node_cluster() -> ClusterState {
        let routing = (0..4u32).fold(IndexRoutingTable::new("t"), |table, shard| {
            table.add_started(shard, &format!("n{}", shard + 1), true)
        });
        ClusterState::new(data_nodes(4)).with_index(IndexMetadata::new("t", 4), routing)
    }

    /// Table `t` with 2 shards, all on the handler.
    pub fn single_node_cluster() -> ClusterState {
        let routing = IndexRoutingTable::new("t")
            .add_started(0, "n1", true)
            .add_started(1, "n1", true);
        ClusterState::new(data_nodes(1)).with_index(IndexMetadata::new("t", 2), routing)
    }

    pub fn table_clustered_by(column: &str) -> Arc<TableInfo> {
        Arc::new(TableInfo::doc_table("doc", "t").with_clustered_by(column))
    }

    pub fn queried(table: Arc<TableInfo>, spec: QuerySpec) -> Arc<QueriedRelation> {
        Arc::new(QueriedRelation::table(table, spec))
    }
}

use std::sync::Arc;

use uuid::Uuid;

use fixtures::*;

use crate::{
    analyzer::{Literal, OrderBy, QueriedRelation, QuerySpec, Symbol, WhereClause},
    error::{ErrorKind, PlannerError},
    metadata::{ClusterState, RowGranularity, RoutingProvider},
    planner::{
        AggregateMode, Limits, Plan, Planner, PlannerConfig, PlannerContext, Projection, SessionContext,
        MERGE_ON_HANDLER,
    },
};

fn plan_with(state: &ClusterState, config: PlannerConfig, seed: i32, relation: &Arc<QueriedRelation>) -> Result<Plan, PlannerError> {
    let mut ctx = PlannerContext::new(state, config, seed);
    Planner::new().plan(relation, &mut ctx)
}

fn plan(state: &ClusterState, relation: &Arc<QueriedRelation>) -> Plan {
    plan_with(state, PlannerConfig::new(), 42, relation).unwrap()
}

fn group_sum_order_limit() -> QuerySpec {
    QuerySpec::new(vec![col("a"), sum(col("b"))])
        .with_group_by(vec![col("a")])
        .with_order_by(OrderBy::asc(col("a")))
        .with_limit(10)
}

fn modes(projections: &[Projection]) -> Vec<Option<AggregateMode>> {
    projections.iter().map(Projection::mode).collect()
}

fn names(projections: &[Projection]) -> Vec<&'static str> {
    projections.iter().map(Projection::name).collect()
}

// ---- scenario A: count(*) ----

#[test]
fn count_star_uses_a_single_count_phase() {
    let state = two_node_cluster();
    let where_clause = WhereClause::new(Symbol::function("op_=", vec![col("x"), Symbol::literal_int(5)]));
    let spec = QuerySpec::new(vec![count_star()]).with_where(where_clause);
    let relation = queried(table_clustered_by("id"), spec);

    let result = plan(&state, &relation);
    let Plan::Count(count) = &result else { panic!("expected count plan, got {:?}", result) };

    let expected = RoutingProvider::new(42, vec![])
        .for_indices(&state, &["t".to_string()], &Default::default(), false)
        .unwrap();
    assert_eq!(count.count_phase.routing, expected);
    assert_eq!(count.count_phase.routing.num_shards(), 3);
    assert_eq!(result.phase_ids(), vec![0]);
    assert_eq!(result.result_description().num_outputs, 1);
    assert!(count.count_phase.where_clause.has_query());
}

#[test]
fn count_routing_is_deterministic_per_seed() {
    let state = two_node_cluster();
    let relation = queried(table_clustered_by("id"), QuerySpec::new(vec![count_star()]));
    for seed in [0, 7, 42, -3] {
        let a = plan_with(&state, PlannerConfig::new(), seed, &relation).unwrap();
        let b = plan_with(&state, PlannerConfig::new(), seed, &relation).unwrap();
        let (Plan::Count(a), Plan::Count(b)) = (a, b) else { panic!("expected count plans") };
        assert_eq!(a.count_phase.routing, b.count_phase.routing);
    }
}

#[test]
fn count_with_limit_zero_or_offset_is_planned_generically() {
    let state = two_node_cluster();
    let relation = queried(table_clustered_by("id"), QuerySpec::new(vec![count_star()]).with_limit(0));
    let Plan::Merge(merge) = plan(&state, &relation) else { panic!("expected merge plan") };
    assert_eq!(names(&merge.merge_phase.projections), vec!["aggregation", "topN"]);
    assert_eq!(merge.merge_phase.projections[1].limits(), Some((Some(0), 0)));

    let relation = queried(table_clustered_by("id"), QuerySpec::new(vec![count_star()]).with_offset(1));
    assert!(matches!(plan(&state, &relation), Plan::Merge(_)));
}

#[test]
fn count_pushdown_can_be_disabled() {
    let state = two_node_cluster();
    let relation = queried(table_clustered_by("id"), QuerySpec::new(vec![count_star()]));
    let result = plan_with(&state, PlannerConfig::generic(), 1, &relation).unwrap();
    assert!(matches!(result, Plan::Merge(_)));
}

// ---- scenario B: two tier group by ----

#[test]
fn group_by_on_non_clustered_column_merges_on_handler() {
    let state = four_node_cluster();
    let relation = queried(table_clustered_by("id"), group_sum_order_limit());

    let result = plan(&state, &relation);
    let Plan::Merge(merge) = &result else { panic!("expected merge plan, got {:?}", result) };

    let Plan::Collect(collect) = merge.sub_plan.as_ref() else { panic!("expected collect sub plan") };
    assert_eq!(collect.collect_phase.routing.nodes().len(), 4);
    assert_eq!(modes(&collect.collect_phase.projections), vec![Some(AggregateMode::IterPartial)]);
    assert_eq!(collect.collect_phase.projections[0].required_granularity(), RowGranularity::Shard);

    let phase = &merge.merge_phase;
    assert_eq!(phase.name, MERGE_ON_HANDLER);
    assert_eq!(phase.num_upstreams, 4);
    assert_eq!(phase.node_ids, vec![HANDLER.to_string()]);
    assert_eq!(names(&phase.projections), vec!["group", "orderedTopN", "topN"]);
    assert_eq!(phase.projections[0].mode(), Some(AggregateMode::PartialFinal));
    assert_eq!(phase.projections[0].required_granularity(), RowGranularity::Cluster);
    assert_eq!(phase.projections[1].limits(), Some((Some(10), 0)));
    assert_eq!(phase.projections[2].limits(), Some((Some(10), 0)));

    let description = result.result_description();
    assert_eq!(description.order_by.as_ref().map(|o| o.indices.clone()), Some(vec![0]));
    assert_eq!(description.deferred_limits(), Limits::unbounded());
    assert_eq!(description.num_outputs, 2);
    assert_eq!(result.phase_ids(), vec![0, 1]);
}

#[test]
fn select_order_differing_from_group_outputs_adds_eval() {
    let state = four_node_cluster();
    let spec = QuerySpec::new(vec![sum(col("b")), col("a")]).with_group_by(vec![col("a")]);
    let Plan::Merge(merge) = plan(&state, &queried(table_clustered_by("id"), spec)) else {
        panic!("expected merge plan")
    };
    let last = merge.merge_phase.projections.last().unwrap();
    assert_eq!(last, &Projection::Eval { outputs: vec![Symbol::InputColumn(1), Symbol::InputColumn(0)] });
}

#[test]
fn having_is_filtered_after_the_final_group() {
    let state = four_node_cluster();
    let having = Symbol::function("op_>", vec![sum(col("b")), Symbol::literal_int(100)]);
    let spec = QuerySpec::new(vec![col("a"), sum(col("b"))])
        .with_group_by(vec![col("a")])
        .with_having(having);
    let Plan::Merge(merge) = plan(&state, &queried(table_clustered_by("id"), spec)) else {
        panic!("expected merge plan")
    };
    assert_eq!(names(&merge.merge_phase.projections), vec!["group", "filter"]);
    assert_eq!(merge.merge_phase.projections[1].required_granularity(), RowGranularity::Shard);
}

// ---- scenario C: collector-local group by ----

#[test]
fn group_by_clustered_column_stays_on_collectors() {
    let state = four_node_cluster();
    let relation = queried(table_clustered_by("a"), group_sum_order_limit());

    let result = plan(&state, &relation);
    let Plan::Collect(collect) = &result else { panic!("expected collect plan, got {:?}", result) };
    let projections = &collect.collect_phase.projections;
    assert_eq!(names(projections), vec!["group", "orderedTopN"]);
    assert_eq!(projections[0].mode(), Some(AggregateMode::IterFinal));
    assert_eq!(projections[0].required_granularity(), RowGranularity::Shard);
    assert_eq!(projections[1].limits(), Some((Some(10), 0)));

    let description = result.result_description();
    assert_eq!(description.deferred_limits(), Limits::new(Some(10), 0));
    assert_eq!(description.max_rows_per_node, Some(10));
    assert_eq!(description.node_ids.len(), 4);
    assert_eq!(result.phase_ids(), vec![0]);
}

#[test]
fn collector_group_by_trims_with_limit_plus_offset() {
    let state = four_node_cluster();
    let spec = QuerySpec::new(vec![col("a"), sum(col("b"))])
        .with_group_by(vec![col("a")])
        .with_limit(10)
        .with_offset(5);
    let result = plan(&state, &queried(table_clustered_by("a"), spec));
    let Plan::Collect(collect) = &result else { panic!("expected collect plan") };
    assert_eq!(collect.collect_phase.projections[1].limits(), Some((Some(15), 0)));
    assert_eq!(result.result_description().deferred_limits(), Limits::new(Some(10), 5));
}

#[test]
fn collector_group_by_ordered_by_an_unselected_key_merges_on_handler() {
    let state = four_node_cluster();
    let spec = QuerySpec::new(vec![sum(col("b"))])
        .with_group_by(vec![col("a")])
        .with_order_by(OrderBy::asc(col("a")))
        .with_limit(2)
        .with_offset(1);
    let result = plan(&state, &queried(table_clustered_by("a"), spec));
    let Plan::Merge(merge) = &result else { panic!("expected merge plan, got {:?}", result) };

    // collectors keep the key so the handler can restore the order
    let Plan::Collect(collect) = merge.sub_plan.as_ref() else { panic!("expected collect sub plan") };
    assert_eq!(names(&collect.collect_phase.projections), vec!["group", "orderedTopN"]);
    assert_eq!(collect.collect_phase.projections[1].limits(), Some((Some(3), 0)));
    assert_eq!(collect.result.num_outputs, 2);
    assert_eq!(collect.result.order_by.as_ref().map(|o| o.indices.clone()), Some(vec![0]));

    assert_eq!(merge.merge_phase.name, MERGE_ON_HANDLER);
    assert_eq!(merge.merge_phase.num_upstreams, 4);
    assert_eq!(names(&merge.merge_phase.projections), vec!["orderedTopN"]);
    assert_eq!(merge.merge_phase.projections[0].limits(), Some((Some(2), 1)));

    let description = result.result_description();
    assert_eq!(description.node_ids.iter().collect::<Vec<_>>(), vec![HANDLER]);
    assert_eq!(description.deferred_limits(), Limits::unbounded());
    assert_eq!(description.order_by, None);
    assert_eq!(description.num_outputs, 1);
    assert_eq!(result.phase_ids(), vec![0, 1]);
}

#[test]
fn collector_group_by_ordered_by_an_unselected_key_stays_local_on_the_handler() {
    let state = single_node_cluster();
    let spec = QuerySpec::new(vec![sum(col("b"))])
        .with_group_by(vec![col("a")])
        .with_order_by(OrderBy::asc(col("a")))
        .with_limit(2);
    let result = plan(&state, &queried(table_clustered_by("a"), spec));
    let Plan::Collect(collect) = &result else { panic!("expected collect plan, got {:?}", result) };
    assert_eq!(names(&collect.collect_phase.projections), vec!["group", "orderedTopN"]);
    assert_eq!(result.result_description().order_by, None);
    assert_eq!(result.result_description().num_outputs, 1);
}

#[test]
fn collect_phases_run_as_the_session_user() {
    let state = four_node_cluster();
    let relation = queried(table_clustered_by("a"), group_sum_order_limit());
    let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 42)
        .with_session(SessionContext::new("alice", "doc"));
    let Plan::Collect(collect) = Planner::new().plan(&relation, &mut ctx).unwrap() else {
        panic!("expected collect plan")
    };
    assert_eq!(collect.collect_phase.user, "alice");
}

#[test]
fn collector_group_by_rejects_versions_before_building_phases() {
    let state = four_node_cluster();
    let version = Symbol::reference("t", "_version", crate::analyzer::DataType::Long);
    let pinned = WhereClause::new(Symbol::function("op_=", vec![version.clone(), Symbol::literal_int(1)]));
    let relation = queried(table_clustered_by("a"), group_sum_order_limit().with_where(pinned));

    let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 1);
    let err = Planner::new().plan(&relation, &mut ctx).unwrap_err();
    assert_eq!(err, PlannerError::VersionInvalid);
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ctx.next_execution_phase_id(), 0);

    let having = Symbol::function("op_>", vec![version, Symbol::literal_int(1)]);
    let relation = queried(table_clustered_by("a"), group_sum_order_limit().with_having(having));
    assert_eq!(plan_with(&state, PlannerConfig::new(), 1, &relation).unwrap_err(), PlannerError::VersionInvalid);
}

#[test]
fn collector_group_by_rejects_object_keys() {
    let state = four_node_cluster();
    let obj = Symbol::reference("t", "o", crate::analyzer::DataType::Object);
    let spec = QuerySpec::new(vec![obj.clone()]).with_group_by(vec![obj]);
    let err = plan_with(&state, PlannerConfig::new(), 1, &queried(table_clustered_by("o"), spec)).unwrap_err();
    assert!(matches!(err, PlannerError::InvalidGroupKey { .. }));
}

#[test]
fn collector_group_by_can_be_disabled() {
    let state = four_node_cluster();
    let relation = queried(table_clustered_by("a"), group_sum_order_limit());
    let result = plan_with(&state, PlannerConfig::generic(), 42, &relation).unwrap();
    assert!(matches!(result, Plan::Merge(_)));
}

// ---- aggregation tiers ----

#[test]
fn aggregation_on_handler_is_single_tier() {
    let state = single_node_cluster();
    let relation = queried(table_clustered_by("id"), QuerySpec::new(vec![sum(col("b"))]));
    let result = plan(&state, &relation);
    let Plan::Collect(collect) = &result else { panic!("expected collect plan") };
    assert_eq!(modes(&collect.collect_phase.projections), vec![Some(AggregateMode::IterFinal)]);
    assert_eq!(result.phase_ids(), vec![0]);
}

#[test]
fn distributed_aggregation_is_two_tier() {
    let state = two_node_cluster();
    let relation = queried(table_clustered_by("id"), QuerySpec::new(vec![sum(col("b"))]));
    let result = plan(&state, &relation);
    let Plan::Merge(merge) = &result else { panic!("expected merge plan") };
    let Plan::Collect(collect) = merge.sub_plan.as_ref() else { panic!("expected collect sub plan") };

    assert_eq!(modes(&collect.collect_phase.projections), vec![Some(AggregateMode::IterPartial)]);
    assert_eq!(modes(&merge.merge_phase.projections), vec![Some(AggregateMode::PartialFinal)]);
    assert_eq!(merge.merge_phase.num_upstreams, 2);
    assert_eq!(result.result_description().max_rows_per_node, Some(1));
    assert_eq!(merge.merge_phase.input_columns, vec![Symbol::InputColumn(0)]);
}

#[test]
fn no_match_filter_aggregates_on_handler() {
    let state = two_node_cluster();
    let spec = QuerySpec::new(vec![sum(col("b"))]).with_where(WhereClause::no_match());
    let result = plan(&state, &queried(table_clustered_by("id"), spec));
    let Plan::Collect(collect) = &result else { panic!("expected collect plan") };
    assert!(collect.collect_phase.routing.is_empty());
    assert_eq!(modes(&collect.collect_phase.projections), vec![Some(AggregateMode::IterFinal)]);
}

// ---- limit placement ----

#[test]
fn limit_on_handler_is_applied_once_with_real_values() {
    let state = single_node_cluster();
    let spec = QuerySpec::new(vec![col("a")]).with_limit(5).with_offset(3);
    let result = plan(&state, &queried(table_clustered_by("id"), spec));
    let Plan::Collect(collect) = &result else { panic!("expected collect plan") };

    assert_eq!(names(&collect.collect_phase.projections), vec!["topN"]);
    assert_eq!(collect.collect_phase.projections[0].limits(), Some((Some(5), 3)));
    assert_eq!(result.result_description().deferred_limits(), Limits::unbounded());
}

#[test]
fn distributed_limit_requests_limit_plus_offset_and_defers_the_cut() {
    let state = two_node_cluster();
    let spec = QuerySpec::new(vec![col("a")]).with_limit(5).with_offset(3);
    let result = plan(&state, &queried(table_clustered_by("id"), spec));
    let Plan::Collect(collect) = &result else { panic!("expected collect plan") };

    let top_ns: Vec<_> = collect.collect_phase.projections.iter().filter_map(Projection::limits).collect();
    assert_eq!(top_ns, vec![(Some(8), 0)]);
    assert_eq!(result.result_description().deferred_limits(), Limits::new(Some(5), 3));
    assert_eq!(result.result_description().max_rows_per_node, Some(8));
}

#[test]
fn limit_parameters_are_resolved_from_the_context() {
    let state = single_node_cluster();
    let spec = QuerySpec::new(vec![col("a")]).with_limit_symbol(Symbol::Parameter(0));
    let relation = queried(table_clustered_by("id"), spec);

    let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 1).with_params(vec![Literal::Int(7)]);
    let result = Planner::new().plan(&relation, &mut ctx).unwrap();
    assert_eq!(result.projections()[0].limits(), Some((Some(7), 0)));

    let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 1);
    let err = Planner::new().plan(&relation, &mut ctx).unwrap_err();
    assert_eq!(err, PlannerError::MissingParameter(1));
}

#[test]
fn plain_order_is_pushed_into_the_collect_phase() {
    let state = two_node_cluster();
    let spec = QuerySpec::new(vec![col("a"), col("b")]).with_order_by(OrderBy::desc(col("b"))).with_limit(5);
    let result = plan(&state, &queried(table_clustered_by("id"), spec));
    let Plan::Collect(collect) = &result else { panic!("expected collect plan") };

    assert_eq!(collect.collect_phase.order_by, Some(OrderBy::desc(col("b"))));
    assert_eq!(names(&collect.collect_phase.projections), vec!["topN"]);
    let order = result.result_description().order_by.as_ref().unwrap();
    assert_eq!(order.indices, vec![1]);
    assert_eq!(order.reverse_flags, vec![true]);
}

#[test]
fn order_on_an_unselected_column_is_applied_on_the_handler() {
    let state = two_node_cluster();
    let spec = QuerySpec::new(vec![col("a")]).with_order_by(OrderBy::asc(col("b"))).with_limit(5).with_offset(1);
    let result = plan(&state, &queried(table_clustered_by("id"), spec));
    let Plan::Merge(merge) = &result else { panic!("expected merge plan, got {:?}", result) };

    let Plan::Collect(collect) = merge.sub_plan.as_ref() else { panic!("expected collect sub plan") };
    assert_eq!(collect.collect_phase.projections[0].limits(), Some((Some(6), 0)));
    assert_eq!(names(&merge.merge_phase.projections), vec!["orderedTopN", "eval"]);
    assert_eq!(merge.merge_phase.projections[0].limits(), Some((Some(5), 1)));

    let description = result.result_description();
    assert_eq!(description.deferred_limits(), Limits::unbounded());
    assert_eq!(description.order_by, None);
    assert_eq!(description.num_outputs, 1);
}

#[test]
fn order_on_an_unselected_column_stays_local_on_the_handler() {
    let state = single_node_cluster();
    let spec = QuerySpec::new(vec![col("a")]).with_order_by(OrderBy::asc(col("b"))).with_limit(5);
    let result = plan(&state, &queried(table_clustered_by("id"), spec));
    let Plan::Collect(collect) = &result else { panic!("expected collect plan") };
    assert_eq!(names(&collect.collect_phase.projections), vec!["topN", "eval"]);
    assert_eq!(result.result_description().order_by, None);
}

// ---- errors and determinism ----

#[test]
fn derived_relations_are_unsupported() {
    let state = two_node_cluster();
    let relation = Arc::new(QueriedRelation::Derived {
        name: "sub".into(),
        query_spec: QuerySpec::new(vec![col("a")]),
    });
    let err = plan_with(&state, PlannerConfig::new(), 1, &relation).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(!err.is_retryable());
}

#[test]
fn awareness_attributes_fail_loudly() {
    let state = two_node_cluster();
    let relation = queried(table_clustered_by("id"), QuerySpec::new(vec![col("a")]));
    let config = PlannerConfig::new().with_awareness_attributes(&["zone"]);
    let err = plan_with(&state, config, 1, &relation).unwrap_err();
    assert!(matches!(err, PlannerError::Unsupported(_)));
}

#[test]
fn same_seed_and_job_give_identical_plans() {
    let state = four_node_cluster();
    let relation = queried(table_clustered_by("id"), group_sum_order_limit());
    let job_id = Uuid::new_v4();

    let build = || {
        let mut ctx = PlannerContext::new(&state, PlannerConfig::new(), 42).with_job_id(job_id);
        Planner::new().plan(&relation, &mut ctx).unwrap().to_json().unwrap()
    };
    let first = build();
    assert_eq!(first, build());
    assert_eq!(first["plan"], "merge");
    assert_eq!(first["merge_phase"]["job_id"], job_id.to_string());
}
