use tracing::debug;

use crate::{
    analyzer::{OrderBy, Symbol},
    error::{PlannerError, PlannerResult},
    metadata::RowGranularity,
    planner::{
        AggregateMode, DistributionInfo, Limits, LogicalPlan, MergePhase, Plan, PlannerContext, PositionalOrderBy,
        Projection, ProjectionBuilder, RoutedCollectPhase,
    },
};

pub const MERGE_ON_HANDLER: &str = "mergeOnHandler";

impl LogicalPlan {
    /// Turns the logical tree into a physical plan, bottom-up.
    ///
    /// `limit_hint`/`offset_hint` tell the source how many rows the caller will
    /// keep at most, `order` is the ordering the caller would like the source to
    /// produce natively.
    ///
    /// Every node maps to projections on its source's plan, with one exception:
    /// an `Eval` that drops the columns a distributed result is ordered by adds a
    /// merge phase on the handler. That merge sorts, applies the deferred limit
    /// and offset, then projects; the resulting plan carries no order and no
    /// deferred limits.
    pub fn build(
        &self,
        ctx: &mut PlannerContext<'_>,
        builder: &ProjectionBuilder,
        limit_hint: Option<u64>,
        offset_hint: u64,
        order: Option<&OrderBy>,
    ) -> PlannerResult<Plan> {
        match self {
            LogicalPlan::Collect { relation, to_collect, where_clause } => {
                let Some(table) = relation.as_table() else {
                    return Err(PlannerError::Unsupported(format!(
                        "cannot collect from relation {}, only tables are supported",
                        relation.name()
                    )));
                };
                let table_info = &table.table_info;
                let routing = ctx.allocate_routing(table_info, where_clause)?;
                let phase = RoutedCollectPhase::new(
                    ctx.job_id(),
                    ctx.next_execution_phase_id(),
                    routing,
                    table_info.row_granularity,
                    to_collect.clone(),
                    vec![],
                    where_clause.clone(),
                    &ctx.session().user,
                )
                .with_order_by(order.cloned());
                Ok(Plan::collect(
                    phase,
                    Limits::new(limit_hint, offset_hint),
                    to_collect.len(),
                    limit_hint,
                    order.and_then(|o| PositionalOrderBy::of(o, to_collect)),
                ))
            }

            LogicalPlan::HashAggregate { source, aggregates } => {
                let mut plan = source.build(ctx, builder, None, 0, None)?;
                let source_outputs = source.outputs();
                if ctx.executes_on_handler(&plan.result_description().node_ids) {
                    debug!(job_id = %ctx.job_id(), "single tier aggregation on handler");
                    let full = builder.aggregation_projection(
                        source_outputs,
                        aggregates,
                        AggregateMode::IterFinal,
                        RowGranularity::Cluster,
                    )?;
                    plan.add_projection(full, None, None)?;
                    return Ok(plan);
                }

                debug!(job_id = %ctx.job_id(), nodes = plan.result_description().node_ids.len(), "two tier aggregation");
                let to_partial = builder.aggregation_projection(
                    source_outputs,
                    aggregates,
                    AggregateMode::IterPartial,
                    RowGranularity::Cluster,
                )?;
                plan.add_projection(to_partial, None, None)?;
                let to_final = builder.aggregation_projection(
                    aggregates,
                    aggregates,
                    AggregateMode::PartialFinal,
                    RowGranularity::Cluster,
                )?;
                let merge_phase = merge_on_handler(ctx, &plan, to_final);
                Ok(Plan::merge(plan, merge_phase, Limits::unbounded(), aggregates.len(), Some(1), None))
            }

            LogicalPlan::GroupHashAggregate { source, aggregates, group_keys, outputs } => {
                let mut plan = source.build(ctx, builder, None, 0, None)?;
                let source_outputs = source.outputs();
                if ctx.executes_on_handler(&plan.result_description().node_ids) {
                    debug!(job_id = %ctx.job_id(), "single tier group by on handler");
                    let group = builder.group_projection(
                        source_outputs,
                        group_keys,
                        aggregates,
                        AggregateMode::IterFinal,
                        RowGranularity::Cluster,
                    )?;
                    plan.add_projection(group, None, None)?;
                    return Ok(plan);
                }

                debug!(job_id = %ctx.job_id(), nodes = plan.result_description().node_ids.len(), "two tier group by");
                let to_partial = builder.group_projection(
                    source_outputs,
                    group_keys,
                    aggregates,
                    AggregateMode::IterPartial,
                    RowGranularity::Shard,
                )?;
                plan.add_projection(to_partial, None, None)?;
                let to_final = builder.group_projection(
                    outputs,
                    group_keys,
                    aggregates,
                    AggregateMode::PartialFinal,
                    RowGranularity::Cluster,
                )?;
                let merge_phase = merge_on_handler(ctx, &plan, to_final);
                Ok(Plan::merge(plan, merge_phase, Limits::unbounded(), outputs.len(), None, None))
            }

            LogicalPlan::Filter { source, having } => {
                let mut plan = source.build(ctx, builder, limit_hint, offset_hint, order)?;
                let filter = ProjectionBuilder::filter_projection(source.outputs(), having)?;
                plan.add_projection(filter, None, None)?;
                Ok(plan)
            }

            LogicalPlan::Order { source, order_by } => {
                let mut plan = source.build(ctx, builder, limit_hint, offset_hint, Some(order_by))?;
                if plan.result_description().order_by.is_none() {
                    let source_outputs = source.outputs();
                    let ordered = ProjectionBuilder::top_n_or_eval(
                        source_outputs,
                        Some(order_by),
                        offset_hint,
                        limit_hint,
                        source_outputs,
                    )?;
                    plan.add_projection(ordered, None, PositionalOrderBy::of(order_by, source_outputs))?;
                }
                Ok(plan)
            }

            LogicalPlan::Limit { source, limit, offset } => {
                let limits = ctx.resolve_limits(limit.as_ref(), offset.as_ref())?;
                let mut plan = source.build(ctx, builder, limits.limit_and_offset(), 0, order)?;
                let inputs = Symbol::input_columns(source.outputs().len());
                if ctx.executes_on_handler(&plan.result_description().node_ids) {
                    let top_n = Projection::TopN { limit: limits.limit, offset: limits.offset, outputs: inputs };
                    // the cut is final, nothing is left for the consumer
                    plan.add_projection(top_n, Some(Limits::unbounded()), None)?;
                } else {
                    let top_n = Projection::TopN { limit: limits.limit_and_offset(), offset: 0, outputs: inputs };
                    plan.add_projection(top_n, Some(limits), None)?;
                }
                Ok(plan)
            }

            LogicalPlan::Eval { source, outputs } => {
                let mut plan = source.build(ctx, builder, limit_hint, offset_hint, order)?;
                let source_outputs = source.outputs();
                let eval = ProjectionBuilder::top_n_or_eval(source_outputs, None, 0, None, outputs)?;
                let Some(order_by) = plan.result_description().order_by.clone() else {
                    plan.add_projection(eval, None, None)?;
                    return Ok(plan);
                };
                if let Some(remapped) = order_by.remap(source_outputs, outputs) {
                    plan.add_projection(eval, None, Some(remapped))?;
                    return Ok(plan);
                }
                if ctx.executes_on_handler(&plan.result_description().node_ids) {
                    // rows are already in their final order
                    plan.add_projection(eval, None, None)?;
                    plan.clear_order();
                    return Ok(plan);
                }

                // order columns are projected away: sort and trim on the handler first
                debug!(job_id = %ctx.job_id(), "ordered merge before eval");
                let result = plan.result_description();
                let inputs = result.stream_outputs();
                let deferred = result.deferred_limits();
                let ordered = Projection::OrderedTopN {
                    limit: deferred.limit,
                    offset: deferred.offset,
                    outputs: inputs.clone(),
                    order_by: order_by.input_columns(),
                    reverse_flags: order_by.reverse_flags.clone(),
                    nulls_first: order_by.nulls_first.clone(),
                };
                let merge_phase = merge_on_handler(ctx, &plan, ordered);
                let mut merged = Plan::merge(plan, merge_phase, Limits::unbounded(), inputs.len(), None, None);
                merged.add_projection(eval, None, None)?;
                Ok(merged)
            }
        }
    }
}

/// Single merge on the handler over every upstream node of `upstream`.
pub(crate) fn merge_on_handler(ctx: &mut PlannerContext<'_>, upstream: &Plan, to_final: Projection) -> MergePhase {
    let result = upstream.result_description();
    MergePhase::new(
        ctx.job_id(),
        ctx.next_execution_phase_id(),
        MERGE_ON_HANDLER,
        result.node_ids.len(),
        vec![ctx.handler_node().to_string()],
        result.stream_outputs(),
        vec![to_final],
        DistributionInfo::SameNode,
    )
}
