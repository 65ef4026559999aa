use std::cmp::Ordering;

use tracing::trace;

use crate::{
    analyzer::Literal,
    executor::Row,
    planner::{Limits, PositionalOrderBy, ResultDescription},
};

/// Handler-side trimming of merged rows.
pub struct TopN;

impl TopN {
    /// Skips `offset` rows and keeps at most `limit` of the rest.
    pub fn apply(rows: Vec<Row>, limits: Limits) -> Vec<Row> {
        let kept = rows.into_iter().skip(limits.offset as usize);
        match limits.limit {
            Some(limit) => kept.take(limit as usize).collect(),
            None => kept.collect(),
        }
    }

    /// Finishes a result on the handler: restores the positional order across
    /// upstreams, then applies the deferred limit and offset. A result produced
    /// on a single node is already in order.
    pub fn finish(mut rows: Vec<Row>, result: &ResultDescription) -> Vec<Row> {
        if let Some(order) = &result.order_by {
            if result.node_ids.len() > 1 {
                Self::sort(&mut rows, order);
            }
        }
        let limits = result.deferred_limits();
        trace!(rows = rows.len(), limit = ?limits.limit, offset = limits.offset, "deferred top n");
        Self::apply(rows, limits)
    }

    /// Stable sort, so rows comparing equal keep their upstream order.
    pub fn sort(rows: &mut [Row], order: &PositionalOrderBy) {
        rows.sort_by(|a, b| Self::compare(a, b, order));
    }

    fn compare(a: &Row, b: &Row, order: &PositionalOrderBy) -> Ordering {
        for (pos, &idx) in order.indices.iter().enumerate() {
            let reverse = order.reverse_flags.get(pos).copied().unwrap_or(false);
            let nulls_first = order.nulls_first.get(pos).copied().unwrap_or(reverse);
            let ordering = match (a.get(idx), b.get(idx)) {
                (Some(Literal::Null) | None, Some(Literal::Null) | None) => Ordering::Equal,
                (Some(Literal::Null) | None, _) => if nulls_first { Ordering::Less } else { Ordering::Greater },
                (_, Some(Literal::Null) | None) => if nulls_first { Ordering::Greater } else { Ordering::Less },
                (Some(x), Some(y)) => {
                    let ordering = compare_literals(x, y);
                    if reverse { ordering.reverse() } else { ordering }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

// numbers compare by value across int/float; otherwise by type rank first
fn compare_literals(a: &Literal, b: &Literal) -> Ordering {
    match (a, b) {
        (Literal::Int(x), Literal::Int(y)) => x.cmp(y),
        (Literal::Float(x), Literal::Float(y)) => x.cmp(y),
        (Literal::Int(x), Literal::Float(y)) => (*x as f64).total_cmp(&y.into_inner()),
        (Literal::Float(x), Literal::Int(y)) => x.into_inner().total_cmp(&(*y as f64)),
        (Literal::String(x), Literal::String(y)) => x.cmp(y),
        (Literal::Bool(x), Literal::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(literal: &Literal) -> u8 {
    match literal {
        Literal::Bool(_) => 0,
        Literal::Int(_) | Literal::Float(_) => 1,
        Literal::String(_) => 2,
        Literal::Null => 3,
    }
}
