use std::sync::Arc;

use crate::analyzer::{HavingClause, OrderBy, QueriedRelation, Symbol, WhereClause};

/// Logical shape of a single-table query.
///
/// The tree is a chain: every node but `Collect` has exactly one source and
/// `Collect` is the only leaf. `outputs()` never needs a physical build.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Reads `to_collect` from the relation's shards.
    Collect {
        relation: Arc<QueriedRelation>,
        to_collect: Vec<Symbol>,
        where_clause: WhereClause,
    },

    /// Global aggregation (no GROUP BY).
    HashAggregate {
        source: Arc<LogicalPlan>,
        aggregates: Vec<Symbol>,
    },

    /// Outputs are the group keys followed by the aggregates.
    GroupHashAggregate {
        source: Arc<LogicalPlan>,
        aggregates: Vec<Symbol>,
        group_keys: Vec<Symbol>,
        outputs: Vec<Symbol>,
    },

    /// HAVING
    Filter {
        source: Arc<LogicalPlan>,
        having: HavingClause,
    },

    Order {
        source: Arc<LogicalPlan>,
        order_by: OrderBy,
    },

    /// LIMIT / OFFSET, still unevaluated.
    Limit {
        source: Arc<LogicalPlan>,
        limit: Option<Symbol>,
        offset: Option<Symbol>,
    },

    /// Re-projects the source to the requested output list.
    Eval {
        source: Arc<LogicalPlan>,
        outputs: Vec<Symbol>,
    },
}

impl LogicalPlan {
    pub fn group_hash_aggregate(source: Arc<LogicalPlan>, aggregates: Vec<Symbol>, group_keys: Vec<Symbol>) -> Self {
        let outputs = group_keys.iter().chain(aggregates.iter()).cloned().collect();
        LogicalPlan::GroupHashAggregate { source, aggregates, group_keys, outputs }
    }

    pub fn outputs(&self) -> &[Symbol] {
        match self {
            LogicalPlan::Collect { to_collect, .. } => to_collect,
            LogicalPlan::HashAggregate { aggregates, .. } => aggregates,
            LogicalPlan::GroupHashAggregate { outputs, .. } => outputs,
            LogicalPlan::Filter { source, .. }
            | LogicalPlan::Order { source, .. }
            | LogicalPlan::Limit { source, .. } => source.outputs(),
            LogicalPlan::Eval { outputs, .. } => outputs,
        }
    }

    pub fn source(&self) -> Option<&Arc<LogicalPlan>> {
        match self {
            LogicalPlan::Collect { .. } => None,
            LogicalPlan::HashAggregate { source, .. }
            | LogicalPlan::GroupHashAggregate { source, .. }
            | LogicalPlan::Filter { source, .. }
            | LogicalPlan::Order { source, .. }
            | LogicalPlan::Limit { source, .. }
            | LogicalPlan::Eval { source, .. } => Some(source),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogicalPlan::Collect { .. } => "Collect",
            LogicalPlan::HashAggregate { .. } => "HashAggregate",
            LogicalPlan::GroupHashAggregate { .. } => "GroupHashAggregate",
            LogicalPlan::Filter { .. } => "Filter",
            LogicalPlan::Order { .. } => "Order",
            LogicalPlan::Limit { .. } => "Limit",
            LogicalPlan::Eval { .. } => "Eval",
        }
    }

    /// Node names from the root down to the leaf.
    pub fn chain(&self) -> Vec<&'static str> {
        let mut names = vec![self.name()];
        let mut current = self.source();
        while let Some(node) = current {
            names.push(node.name());
            current = node.source();
        }
        names
    }

    /// Rewrites the tree before it is built.
    ///
    /// Sources are collapsed first; a node whose source came back unchanged is
    /// returned as the very same `Arc`, so callers can detect a no-op with
    /// `Arc::ptr_eq`. `Collect`, `Filter` and `Eval` are terminal. There are no
    /// fusion rules yet, so Order + Limit over Collect is not merged into a
    /// sorted collect.
    pub fn try_collapse(plan: &Arc<LogicalPlan>) -> Arc<LogicalPlan> {
        match plan.as_ref() {
            LogicalPlan::Collect { .. } | LogicalPlan::Filter { .. } | LogicalPlan::Eval { .. } => Arc::clone(plan),
            LogicalPlan::HashAggregate { source, .. }
            | LogicalPlan::GroupHashAggregate { source, .. }
            | LogicalPlan::Order { source, .. }
            | LogicalPlan::Limit { source, .. } => {
                let collapsed = Self::try_collapse(source);
                if Arc::ptr_eq(&collapsed, source) {
                    Arc::clone(plan)
                } else {
                    Arc::new(plan.with_source(collapsed))
                }
            }
        }
    }

    fn with_source(&self, source: Arc<LogicalPlan>) -> LogicalPlan {
        match self {
            LogicalPlan::Collect { .. } => self.clone(),
            LogicalPlan::HashAggregate { aggregates, .. } => {
                LogicalPlan::HashAggregate { source, aggregates: aggregates.clone() }
            }
            LogicalPlan::GroupHashAggregate { aggregates, group_keys, outputs, .. } => LogicalPlan::GroupHashAggregate {
                source,
                aggregates: aggregates.clone(),
                group_keys: group_keys.clone(),
                outputs: outputs.clone(),
            },
            LogicalPlan::Filter { having, .. } => LogicalPlan::Filter { source, having: having.clone() },
            LogicalPlan::Order { order_by, .. } => LogicalPlan::Order { source, order_by: order_by.clone() },
            LogicalPlan::Limit { limit, offset, .. } => {
                LogicalPlan::Limit { source, limit: limit.clone(), offset: offset.clone() }
            }
            LogicalPlan::Eval { outputs, .. } => LogicalPlan::Eval { source, outputs: outputs.clone() },
        }
    }
}
