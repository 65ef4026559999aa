use crate::{
    analyzer::{HavingClause, OrderBy, Symbol},
    error::{PlannerError, PlannerResult},
    metadata::RowGranularity,
    planner::{AggregateMode, Aggregation, Projection},
};

/// Rewrites symbols into references to the columns of an input row.
pub struct InputColumns;

impl InputColumns {
    /// Maps `symbol` onto `inputs`: a symbol found in `inputs` becomes the
    /// input column at its position, functions are rewritten argument by
    /// argument and constants are kept.
    pub fn create(symbol: &Symbol, inputs: &[Symbol]) -> PlannerResult<Symbol> {
        if let Some(idx) = inputs.iter().position(|s| s == symbol) {
            return Ok(Symbol::InputColumn(idx));
        }
        match symbol {
            Symbol::Literal(_) | Symbol::Parameter(_) => Ok(symbol.clone()),
            Symbol::Function(f) => {
                let args = f.args.iter()
                    .map(|arg| Self::create(arg, inputs))
                    .collect::<PlannerResult<Vec<_>>>()?;
                Ok(Symbol::function(&f.name, args))
            }
            Symbol::Reference(_) | Symbol::InputColumn(_) => Err(PlannerError::Internal(format!(
                "symbol {} is not available in the input of the projection",
                symbol
            ))),
        }
    }

    pub fn create_all(symbols: &[Symbol], inputs: &[Symbol]) -> PlannerResult<Vec<Symbol>> {
        symbols.iter().map(|s| Self::create(s, inputs)).collect()
    }
}

/// Factory for the projections the planner attaches to phases.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectionBuilder;

impl ProjectionBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregation_projection(
        &self,
        inputs: &[Symbol],
        aggregates: &[Symbol],
        mode: AggregateMode,
        granularity: RowGranularity,
    ) -> PlannerResult<Projection> {
        let aggregations = self.aggregations(inputs, aggregates, mode)?;
        Ok(Projection::Aggregation { aggregations, mode, granularity })
    }

    pub fn group_projection(
        &self,
        inputs: &[Symbol],
        keys: &[Symbol],
        aggregates: &[Symbol],
        mode: AggregateMode,
        granularity: RowGranularity,
    ) -> PlannerResult<Projection> {
        let keys = InputColumns::create_all(keys, inputs)?;
        let values = self.aggregations(inputs, aggregates, mode)?;
        Ok(Projection::Group { keys, values, mode, granularity })
    }

    /// HAVING evaluated as early as possible: shard granularity.
    pub fn filter_projection(inputs: &[Symbol], having: &HavingClause) -> PlannerResult<Projection> {
        Ok(Projection::Filter {
            query: InputColumns::create(&having.query, inputs)?,
            granularity: RowGranularity::Shard,
        })
    }

    /// Cheapest projection that produces `outputs` from `inputs` honouring the
    /// given order and limits: an ordered top-N when there is an order, a plain
    /// top-N when only limits apply and an eval otherwise.
    pub fn top_n_or_eval(
        inputs: &[Symbol],
        order_by: Option<&OrderBy>,
        offset: u64,
        limit: Option<u64>,
        outputs: &[Symbol],
    ) -> PlannerResult<Projection> {
        let mapped_outputs = InputColumns::create_all(outputs, inputs)?;
        match order_by {
            Some(order_by) => Ok(Projection::OrderedTopN {
                limit,
                offset,
                outputs: mapped_outputs,
                order_by: InputColumns::create_all(&order_by.symbols, inputs)?,
                reverse_flags: order_by.reverse_flags.clone(),
                nulls_first: order_by.nulls_first.clone(),
            }),
            None if limit.is_none() && offset == 0 => Ok(Projection::Eval { outputs: mapped_outputs }),
            None => Ok(Projection::TopN { limit, offset, outputs: mapped_outputs }),
        }
    }

    fn aggregations(&self, inputs: &[Symbol], aggregates: &[Symbol], mode: AggregateMode) -> PlannerResult<Vec<Aggregation>> {
        aggregates.iter()
            .map(|aggregate| {
                let Symbol::Function(f) = aggregate else {
                    return Err(PlannerError::Internal(format!("{} is not an aggregate call", aggregate)));
                };
                let inputs = if mode.consumes_partial_state() {
                    // the partial state of an aggregate travels in its own column
                    vec![InputColumns::create(aggregate, inputs)?]
                } else {
                    InputColumns::create_all(&f.args, inputs)?
                };
                Ok(Aggregation { function: f.name.clone(), inputs })
            })
            .collect()
    }
}
