use indexmap::IndexSet;

use crate::analyzer::{QuerySpec, Symbol};

/// Splits a query into what must be fetched from the table and the aggregate
/// calls computed on top of it.
///
/// Both lists are deduplicated and keep first-appearance order, which makes the
/// derived plans deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPoints {
    pub aggregates: Vec<Symbol>,
    pub to_collect: Vec<Symbol>,
}

impl SplitPoints {
    pub fn create(spec: &QuerySpec) -> Self {
        let mut aggregates: IndexSet<Symbol> = IndexSet::new();
        for output in &spec.outputs {
            Self::collect_aggregates(output, &mut aggregates);
        }
        if let Some(having) = &spec.having {
            Self::collect_aggregates(&having.query, &mut aggregates);
        }
        if let Some(order_by) = &spec.order_by {
            for symbol in &order_by.symbols {
                Self::collect_aggregates(symbol, &mut aggregates);
            }
        }

        let mut to_collect: IndexSet<Symbol> = IndexSet::new();
        if aggregates.is_empty() && spec.group_by.is_none() {
            to_collect.extend(spec.outputs.iter().cloned());
        } else {
            to_collect.extend(spec.group_keys().iter().cloned());
            for aggregate in &aggregates {
                if let Symbol::Function(f) = aggregate {
                    for arg in &f.args {
                        Self::collect_aggregate_input(arg, &mut to_collect);
                    }
                }
            }
        }

        Self {
            aggregates: aggregates.into_iter().collect(),
            to_collect: to_collect.into_iter().collect(),
        }
    }

    fn collect_aggregates(symbol: &Symbol, aggregates: &mut IndexSet<Symbol>) {
        if let Symbol::Function(f) = symbol {
            if f.is_aggregate() {
                aggregates.insert(symbol.clone());
            } else {
                for arg in &f.args {
                    Self::collect_aggregates(arg, aggregates);
                }
            }
        }
    }

    // constants are evaluated by the aggregation itself
    fn collect_aggregate_input(arg: &Symbol, to_collect: &mut IndexSet<Symbol>) {
        match arg {
            Symbol::Literal(_) | Symbol::Parameter(_) => {}
            _ => {
                to_collect.insert(arg.clone());
            }
        }
    }
}

/// Concatenates `extra` onto `base`, skipping symbols already present.
pub fn concat_unique(base: &[Symbol], extra: &[Symbol]) -> Vec<Symbol> {
    let mut set: IndexSet<Symbol> = base.iter().cloned().collect();
    set.extend(extra.iter().cloned());
    set.into_iter().collect()
}
