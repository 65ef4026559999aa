use std::sync::Arc;

use tracing::trace;

use crate::{
    analyzer::{concat_unique, QueriedRelation, SplitPoints},
    error::PlannerResult,
    planner::{LogicalPlan, Plan, PlannerContext, ProjectionBuilder},
};

pub struct PlanBuilder;

impl PlanBuilder {
    /// Derives the logical tree of `relation`'s query.
    pub fn from_relation(relation: &Arc<QueriedRelation>) -> Arc<LogicalPlan> {
        let spec = relation.query_spec();
        let split_points = SplitPoints::create(spec);

        // Plain selects also fetch the ORDER BY symbols so the order can be applied after collect
        let to_collect = match &spec.order_by {
            Some(order_by) if split_points.aggregates.is_empty() && spec.group_by.is_none() => {
                concat_unique(&split_points.to_collect, &order_by.symbols)
            }
            _ => split_points.to_collect.clone(),
        };

        let mut plan = Arc::new(LogicalPlan::Collect {
            relation: Arc::clone(relation),
            to_collect,
            where_clause: spec.where_clause.clone(),
        });

        // ---- aggregation ----
        if let Some(group_keys) = &spec.group_by {
            plan = Arc::new(LogicalPlan::group_hash_aggregate(
                plan,
                split_points.aggregates.clone(),
                group_keys.clone(),
            ));
        } else if !split_points.aggregates.is_empty() {
            plan = Arc::new(LogicalPlan::HashAggregate { source: plan, aggregates: split_points.aggregates.clone() });
        }

        if let Some(having) = &spec.having {
            plan = Arc::new(LogicalPlan::Filter { source: plan, having: having.clone() });
        }
        if let Some(order_by) = &spec.order_by {
            plan = Arc::new(LogicalPlan::Order { source: plan, order_by: order_by.clone() });
        }
        if spec.limit.is_some() || spec.offset.is_some() {
            plan = Arc::new(LogicalPlan::Limit {
                source: plan,
                limit: spec.limit.clone(),
                offset: spec.offset.clone(),
            });
        }

        // re-project when accumulated outputs differ from the SELECT list
        if plan.outputs() != spec.outputs.as_slice() {
            plan = Arc::new(LogicalPlan::Eval { source: plan, outputs: spec.outputs.clone() });
        }
        trace!(relation = %relation.name(), chain = ?plan.chain(), "logical plan");
        plan
    }

    /// Builds, collapses and materializes the plan of `relation`.
    pub fn plan(
        relation: &Arc<QueriedRelation>,
        ctx: &mut PlannerContext<'_>,
        builder: &ProjectionBuilder,
    ) -> PlannerResult<Plan> {
        let logical = Self::from_relation(relation);
        let collapsed = LogicalPlan::try_collapse(&logical);
        collapsed.build(ctx, builder, None, 0, None)
    }
}
