use serde::Serialize;

use crate::{analyzer::Symbol, metadata::RowGranularity};

/// Which step of an aggregation a projection performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateMode {
    /// raw rows -> partial state
    IterPartial,
    /// raw rows -> final value
    IterFinal,
    /// partial states -> final value
    PartialFinal,
}

impl AggregateMode {
    pub fn consumes_partial_state(&self) -> bool {
        matches!(self, AggregateMode::PartialFinal)
    }
}

/// One aggregate call inside an aggregation or group projection.
///
/// `inputs` address columns of the incoming rows; in `PartialFinal` mode the
/// single input is the column holding the partial state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Aggregation {
    pub function: String,
    pub inputs: Vec<Symbol>,
}

/// A row transformation attached to a collect or merge phase.
///
/// Projections only describe the work; the execution engine implements them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    Aggregation {
        aggregations: Vec<Aggregation>,
        mode: AggregateMode,
        granularity: RowGranularity,
    },
    Group {
        keys: Vec<Symbol>,
        values: Vec<Aggregation>,
        mode: AggregateMode,
        granularity: RowGranularity,
    },
    Filter {
        query: Symbol,
        granularity: RowGranularity,
    },
    /// Unordered limit/offset.
    TopN {
        limit: Option<u64>,
        offset: u64,
        outputs: Vec<Symbol>,
    },
    OrderedTopN {
        limit: Option<u64>,
        offset: u64,
        outputs: Vec<Symbol>,
        order_by: Vec<Symbol>,
        reverse_flags: Vec<bool>,
        nulls_first: Vec<bool>,
    },
    /// Re-projection; never changes the number of rows.
    Eval {
        outputs: Vec<Symbol>,
    },
}

impl Projection {
    /// Width of the rows this projection emits, or `None` when it passes its
    /// input through unchanged.
    pub fn num_outputs(&self) -> Option<usize> {
        match self {
            Projection::Aggregation { aggregations, .. } => Some(aggregations.len()),
            Projection::Group { keys, values, .. } => Some(keys.len() + values.len()),
            Projection::Filter { .. } => None,
            Projection::TopN { outputs, .. }
            | Projection::OrderedTopN { outputs, .. }
            | Projection::Eval { outputs } => Some(outputs.len()),
        }
    }

    /// Finest scope the projection may run at.
    pub fn required_granularity(&self) -> RowGranularity {
        match self {
            Projection::Aggregation { granularity, .. }
            | Projection::Group { granularity, .. }
            | Projection::Filter { granularity, .. } => *granularity,
            Projection::TopN { .. } | Projection::OrderedTopN { .. } | Projection::Eval { .. } => {
                RowGranularity::Cluster
            }
        }
    }

    pub fn mode(&self) -> Option<AggregateMode> {
        match self {
            Projection::Aggregation { mode, .. } | Projection::Group { mode, .. } => Some(*mode),
            _ => None,
        }
    }

    /// `(limit, offset)` of top-N projections.
    pub fn limits(&self) -> Option<(Option<u64>, u64)> {
        match self {
            Projection::TopN { limit, offset, .. } | Projection::OrderedTopN { limit, offset, .. } => {
                Some((*limit, *offset))
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Projection::Aggregation { .. } => "aggregation",
            Projection::Group { .. } => "group",
            Projection::Filter { .. } => "filter",
            Projection::TopN { .. } => "topN",
            Projection::OrderedTopN { .. } => "orderedTopN",
            Projection::Eval { .. } => "eval",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_passes_width_through() {
        let filter = Projection::Filter { query: Symbol::InputColumn(0), granularity: RowGranularity::Shard };
        assert_eq!(filter.num_outputs(), None);
        assert_eq!(filter.required_granularity(), RowGranularity::Shard);

        let group = Projection::Group {
            keys: vec![Symbol::InputColumn(0)],
            values: vec![Aggregation { function: "sum".into(), inputs: vec![Symbol::InputColumn(1)] }],
            mode: AggregateMode::IterPartial,
            granularity: RowGranularity::Shard,
        };
        assert_eq!(group.num_outputs(), Some(2));
        assert_eq!(group.mode(), Some(AggregateMode::IterPartial));
    }

    #[test]
    fn serializes_with_type_tag() {
        let top_n = Projection::TopN { limit: Some(10), offset: 0, outputs: Symbol::input_columns(1) };
        let json = serde_json::to_value(&top_n).unwrap();
        assert_eq!(json["type"], "top_n");
        assert_eq!(json["limit"], 10);
        assert_eq!(top_n.limits(), Some((Some(10), 0)));
        assert_eq!(serde_json::to_value(AggregateMode::PartialFinal).unwrap(), "PARTIAL_FINAL");
    }
}
