use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    analyzer::{OrderBy, Symbol},
    error::{PlannerError, PlannerResult},
    planner::{CountPhase, ExecutionPhase, MergePhase, Projection, RoutedCollectPhase},
};

/// Resolved LIMIT/OFFSET. `limit: None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Limits {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Limits {
    pub fn new(limit: Option<u64>, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// No trimming at all.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Rows each upstream must deliver so the final cut can still be made.
    pub fn limit_and_offset(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_add(self.offset))
    }
}

/// An ordering expressed as positions in the output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionalOrderBy {
    pub indices: Vec<usize>,
    pub reverse_flags: Vec<bool>,
    pub nulls_first: Vec<bool>,
}

impl PositionalOrderBy {
    /// `None` unless every order symbol is one of `outputs`.
    pub fn of(order_by: &OrderBy, outputs: &[Symbol]) -> Option<Self> {
        let indices = order_by.symbols.iter()
            .map(|symbol| outputs.iter().position(|o| o == symbol))
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            indices,
            reverse_flags: order_by.reverse_flags.clone(),
            nulls_first: order_by.nulls_first.clone(),
        })
    }

    /// The same ordering once rows laid out as `from` are re-projected to `to`.
    pub fn remap(&self, from: &[Symbol], to: &[Symbol]) -> Option<Self> {
        let indices = self.indices.iter()
            .map(|&idx| from.get(idx).and_then(|symbol| to.iter().position(|o| o == symbol)))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { indices, ..self.clone() })
    }

    /// Order-by symbols addressing the positions directly.
    pub fn input_columns(&self) -> Vec<Symbol> {
        self.indices.iter().map(|&idx| Symbol::InputColumn(idx)).collect()
    }
}

/// What the consumer of a plan's rows needs to know.
///
/// `limit`/`offset` is trimming that has not been applied yet and must happen
/// exactly once where the rows converge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultDescription {
    pub node_ids: BTreeSet<String>,
    pub order_by: Option<PositionalOrderBy>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub num_outputs: usize,
    pub max_rows_per_node: Option<u64>,
}

impl ResultDescription {
    /// Columns of the streamed rows, as seen by a downstream phase.
    pub fn stream_outputs(&self) -> Vec<Symbol> {
        Symbol::input_columns(self.num_outputs)
    }

    pub fn deferred_limits(&self) -> Limits {
        Limits::new(self.limit, self.offset)
    }

    fn apply(&mut self, projection: &Projection, deferred: Option<Limits>, order: Option<PositionalOrderBy>) {
        if let Some(width) = projection.num_outputs() {
            self.num_outputs = width;
        }
        if let Some(limits) = deferred {
            self.limit = limits.limit;
            self.offset = limits.offset;
        }
        if order.is_some() {
            self.order_by = order;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectPlan {
    pub collect_phase: RoutedCollectPhase,
    pub result: ResultDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergePlan {
    pub sub_plan: Box<Plan>,
    pub merge_phase: MergePhase,
    pub result: ResultDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountPlan {
    pub count_phase: CountPhase,
    pub result: ResultDescription,
}

/// Physical plan handed to the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum Plan {
    Collect(CollectPlan),
    Merge(MergePlan),
    Count(CountPlan),
}

impl Plan {
    pub fn collect(
        collect_phase: RoutedCollectPhase,
        limits: Limits,
        num_outputs: usize,
        max_rows_per_node: Option<u64>,
        order_by: Option<PositionalOrderBy>,
    ) -> Self {
        let result = ResultDescription {
            node_ids: collect_phase.routing.nodes(),
            order_by,
            limit: limits.limit,
            offset: limits.offset,
            num_outputs,
            max_rows_per_node,
        };
        Plan::Collect(CollectPlan { collect_phase, result })
    }

    pub fn merge(
        sub_plan: Plan,
        merge_phase: MergePhase,
        limits: Limits,
        num_outputs: usize,
        max_rows_per_node: Option<u64>,
        order_by: Option<PositionalOrderBy>,
    ) -> Self {
        let result = ResultDescription {
            node_ids: merge_phase.node_ids(),
            order_by,
            limit: limits.limit,
            offset: limits.offset,
            num_outputs,
            max_rows_per_node,
        };
        Plan::Merge(MergePlan { sub_plan: Box::new(sub_plan), merge_phase, result })
    }

    pub fn count(count_phase: CountPhase) -> Self {
        let result = ResultDescription {
            node_ids: count_phase.routing.nodes(),
            order_by: None,
            limit: None,
            offset: 0,
            num_outputs: 1,
            max_rows_per_node: Some(1),
        };
        Plan::Count(CountPlan { count_phase, result })
    }

    pub fn result_description(&self) -> &ResultDescription {
        match self {
            Plan::Collect(p) => &p.result,
            Plan::Merge(p) => &p.result,
            Plan::Count(p) => &p.result,
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            Plan::Collect(p) => p.collect_phase.job_id,
            Plan::Merge(p) => p.merge_phase.job_id,
            Plan::Count(p) => p.count_phase.job_id,
        }
    }

    /// Appends `projection` to the last phase of the plan.
    ///
    /// `deferred` replaces the trimming still owed by the consumer, `order`
    /// records an ordering the projection establishes.
    pub fn add_projection(
        &mut self,
        projection: Projection,
        deferred: Option<Limits>,
        order: Option<PositionalOrderBy>,
    ) -> PlannerResult<()> {
        match self {
            Plan::Collect(p) => {
                p.result.apply(&projection, deferred, order);
                p.collect_phase.projections.push(projection);
            }
            Plan::Merge(p) => {
                p.result.apply(&projection, deferred, order);
                p.merge_phase.projections.push(projection);
            }
            Plan::Count(_) => {
                return Err(PlannerError::Internal(format!(
                    "cannot add a {} projection to a count plan",
                    projection.name()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn clear_order(&mut self) {
        match self {
            Plan::Collect(p) => p.result.order_by = None,
            Plan::Merge(p) => p.result.order_by = None,
            Plan::Count(p) => p.result.order_by = None,
        }
    }

    /// Projections of the phase that produces the plan's result.
    pub fn projections(&self) -> &[Projection] {
        match self {
            Plan::Collect(p) => &p.collect_phase.projections,
            Plan::Merge(p) => &p.merge_phase.projections,
            Plan::Count(_) => &[],
        }
    }

    /// All phases, upstream first.
    pub fn phases(&self) -> Vec<&dyn ExecutionPhase> {
        match self {
            Plan::Collect(p) => vec![&p.collect_phase as &dyn ExecutionPhase],
            Plan::Merge(p) => {
                let mut phases = p.sub_plan.phases();
                phases.push(&p.merge_phase);
                phases
            }
            Plan::Count(p) => vec![&p.count_phase as &dyn ExecutionPhase],
        }
    }

    pub fn phase_ids(&self) -> Vec<u32> {
        self.phases().iter().map(|phase| phase.phase_id()).collect()
    }

    pub fn to_json(&self) -> PlannerResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| PlannerError::Internal(format!("plan serialization failed: {}", e)))
    }
}
