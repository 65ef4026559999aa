use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::{
    analyzer::QueriedRelation,
    error::{ErrorKind, PlannerResult},
    planner::{CountPlanner, GroupByOptimizer, Plan, PlanBuilder, PlannerContext, ProjectionBuilder},
};

/// Entry point: turns an analyzed relation into a physical plan.
///
/// Strategies are tried from the most specialized to the generic one: the
/// count phase, the collector-local group by, then the logical plan tree.
#[derive(Debug, Default, Clone)]
pub struct Planner {
    projection_builder: ProjectionBuilder,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self, relation: &Arc<QueriedRelation>, ctx: &mut PlannerContext<'_>) -> PlannerResult<Plan> {
        debug!(job_id = %ctx.job_id(), handler = ctx.handler_node(), relation = %relation.name(), "planning query");
        let result = self.plan_relation(relation, ctx);
        if let Err(err) = &result {
            match err.kind() {
                ErrorKind::Unsupported | ErrorKind::Internal => {
                    error!(job_id = %ctx.job_id(), kind = %err.kind(), code = err.code(), "planning failed: {}", err)
                }
                ErrorKind::RoutingUnavailable => {
                    warn!(job_id = %ctx.job_id(), kind = %err.kind(), code = err.code(), "planning failed: {}", err)
                }
                _ => debug!(job_id = %ctx.job_id(), kind = %err.kind(), code = err.code(), "planning failed: {}", err),
            }
        }
        result
    }

    fn plan_relation(&self, relation: &Arc<QueriedRelation>, ctx: &mut PlannerContext<'_>) -> PlannerResult<Plan> {
        if let Some(table) = relation.as_table() {
            if ctx.config().count_pushdown {
                if let Some(plan) = CountPlanner::try_plan(table, ctx)? {
                    debug!(job_id = %ctx.job_id(), strategy = "count", "plan chosen");
                    return Ok(plan);
                }
            }
            if ctx.config().reduce_on_collector {
                if let Some(plan) = GroupByOptimizer::try_plan(table, ctx, &self.projection_builder)? {
                    debug!(job_id = %ctx.job_id(), strategy = "collector_group_by", "plan chosen");
                    return Ok(plan);
                }
            }
        }
        let plan = PlanBuilder::plan(relation, ctx, &self.projection_builder)?;
        debug!(job_id = %ctx.job_id(), strategy = "logical", phases = ?plan.phase_ids(), "plan chosen");
        Ok(plan)
    }
}
