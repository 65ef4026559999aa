use tracing::debug;

use crate::{
    analyzer::{QueriedTable, Symbol},
    error::{PlannerError, PlannerResult},
    metadata::RowGranularity,
    planner::{CountPhase, Plan, PlannerContext},
};

/// `SELECT count(*) FROM t [WHERE ...]` answered from shard document counts.
pub struct CountPlanner;

impl CountPlanner {
    /// A count plan, or `None` when the query is not a plain `count(*)`.
    pub fn try_plan(table: &QueriedTable, ctx: &mut PlannerContext<'_>) -> PlannerResult<Option<Plan>> {
        let spec = &table.query_spec;
        if table.table_info.row_granularity != RowGranularity::Doc
            || spec.group_by.is_some()
            || spec.having.is_some()
            || !Self::is_count_star(&spec.outputs)
        {
            return Ok(None);
        }
        let limits = ctx.limits(spec)?;
        // a single row: LIMIT 0 or any OFFSET yields nothing
        if limits.offset > 0 || limits.limit == Some(0) {
            return Ok(None);
        }
        if spec.where_clause.has_versions() {
            return Err(PlannerError::VersionInvalid);
        }

        let routing = ctx.allocate_routing(&table.table_info, &spec.where_clause)?;
        let phase = CountPhase::new(ctx.job_id(), ctx.next_execution_phase_id(), routing, spec.where_clause.clone());
        debug!(job_id = %ctx.job_id(), table = %table.table_info.ident, shards = phase.routing.num_shards(), "count phase");
        Ok(Some(Plan::count(phase)))
    }

    fn is_count_star(outputs: &[Symbol]) -> bool {
        matches!(outputs, [Symbol::Function(f)] if f.name == "count" && f.args.is_empty())
    }
}
