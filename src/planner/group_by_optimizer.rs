use tracing::debug;

use crate::{
    analyzer::{DataType, QueriedTable, SplitPoints, Symbol, WhereClause},
    error::{PlannerError, PlannerResult},
    metadata::{RowGranularity, TableInfo},
    planner::{
        merge_on_handler, AggregateMode, Limits, Plan, PlannerContext, PositionalOrderBy, ProjectionBuilder,
        RoutedCollectPhase,
    },
};

/// Group by executed entirely on the collectors.
///
/// When every group lives on exactly one shard (grouping by the clustered-by
/// column or by the full primary key) the shards can emit final groups, and no
/// merge-side re-aggregation is needed.
pub struct GroupByOptimizer;

impl GroupByOptimizer {
    /// The collector-local plan, or `None` when the grouping does not qualify.
    pub fn try_plan(
        table: &QueriedTable,
        ctx: &mut PlannerContext<'_>,
        builder: &ProjectionBuilder,
    ) -> PlannerResult<Option<Plan>> {
        let spec = &table.query_spec;
        let Some(group_keys) = &spec.group_by else { return Ok(None) };
        if group_keys.is_empty() || table.table_info.row_granularity != RowGranularity::Doc {
            return Ok(None);
        }
        if !Self::grouped_by_clustered_column_or_primary_keys(&table.table_info, &spec.where_clause, group_keys) {
            return Ok(None);
        }
        if spec.where_clause.has_versions() || spec.having.as_ref().is_some_and(|h| h.has_versions()) {
            return Err(PlannerError::VersionInvalid);
        }
        Self::reduce_on_collector(table, ctx, builder).map(Some)
    }

    /// Single key: it must be the clustered-by column, and a partitioned table
    /// must be narrowed to one partition. Several keys: exactly the primary key,
    /// in order.
    pub fn grouped_by_clustered_column_or_primary_keys(
        table: &TableInfo,
        where_clause: &WhereClause,
        group_keys: &[Symbol],
    ) -> bool {
        if group_keys.len() > 1 {
            return Self::grouped_by_primary_keys(&table.primary_key, group_keys);
        }
        let Some(Symbol::Reference(key)) = group_keys.first() else { return false };
        table.clustered_by.as_deref() == Some(key.column.as_str())
            && !(table.partitioned && where_clause.partitions.len() != 1)
    }

    fn grouped_by_primary_keys(primary_key: &[String], group_keys: &[Symbol]) -> bool {
        group_keys.len() == primary_key.len()
            && group_keys.iter().zip(primary_key).all(|(key, pk)| {
                matches!(key, Symbol::Reference(r) if &r.column == pk)
            })
    }

    /// Rejects keys whose values cannot be hashed into groups.
    pub fn validate_group_keys(group_keys: &[Symbol]) -> PlannerResult<()> {
        for key in group_keys {
            if let Symbol::Reference(r) = key {
                if matches!(r.data_type, DataType::Object | DataType::Array) {
                    return Err(PlannerError::InvalidGroupKey {
                        column: r.column.clone(),
                        reason: format!("invalid data type '{:?}'", r.data_type).to_lowercase(),
                    });
                }
            }
        }
        Ok(())
    }

    // Collect(Group, [Filter], TopN | OrderedTopN | Eval); a merge on the handler only when the
    // order cannot be expressed over the outputs of a distributed result
    fn reduce_on_collector(
        table: &QueriedTable,
        ctx: &mut PlannerContext<'_>,
        builder: &ProjectionBuilder,
    ) -> PlannerResult<Plan> {
        let spec = &table.query_spec;
        let group_keys = spec.group_keys();
        assert!(!group_keys.is_empty(), "collector-local group by requires group keys");
        Self::validate_group_keys(group_keys)?;

        let split_points = SplitPoints::create(spec);
        let collect_outputs: Vec<Symbol> = group_keys.iter().chain(split_points.aggregates.iter()).cloned().collect();

        let mut projections = vec![builder.group_projection(
            &split_points.to_collect,
            group_keys,
            &split_points.aggregates,
            AggregateMode::IterFinal,
            RowGranularity::Shard,
        )?];
        if let Some(having) = &spec.having {
            projections.push(ProjectionBuilder::filter_projection(&collect_outputs, having)?);
        }
        let limits = ctx.limits(spec)?;
        let routing = ctx.allocate_routing(&table.table_info, &spec.where_clause)?;
        let order = spec.order_by.as_ref().and_then(|o| PositionalOrderBy::of(o, &spec.outputs));

        // ORDER BY on unselected columns across nodes: shards keep those columns for a handler merge
        let merge_order = match &spec.order_by {
            Some(order_by) if order.is_none() && !ctx.executes_on_handler(&routing.nodes()) => Some(order_by),
            _ => None,
        };
        let shard_outputs = if merge_order.is_some() { &collect_outputs } else { &spec.outputs };
        projections.push(ProjectionBuilder::top_n_or_eval(
            &collect_outputs,
            spec.order_by.as_ref(),
            0,
            limits.limit_and_offset(),
            shard_outputs,
        )?);

        let phase = RoutedCollectPhase::new(
            ctx.job_id(),
            ctx.next_execution_phase_id(),
            routing,
            table.table_info.row_granularity,
            split_points.to_collect.clone(),
            projections,
            spec.where_clause.clone(),
            &ctx.session().user,
        );
        debug!(
            job_id = %ctx.job_id(),
            table = %table.table_info.ident,
            nodes = phase.routing.locations.len(),
            "group by on collectors"
        );
        let Some(order_by) = merge_order else {
            return Ok(Plan::collect(phase, limits, spec.outputs.len(), limits.limit_and_offset(), order));
        };

        let shard_order = PositionalOrderBy::of(order_by, &collect_outputs);
        let collect = Plan::collect(phase, limits, collect_outputs.len(), limits.limit_and_offset(), shard_order);
        let to_final = ProjectionBuilder::top_n_or_eval(
            &collect_outputs,
            Some(order_by),
            limits.offset,
            limits.limit,
            &spec.outputs,
        )?;
        let merge_phase = merge_on_handler(ctx, &collect, to_final);
        debug!(job_id = %ctx.job_id(), phase_id = merge_phase.phase_id, "ordered merge of collector groups");
        Ok(Plan::merge(collect, merge_phase, Limits::unbounded(), spec.outputs.len(), None, None))
    }
}
