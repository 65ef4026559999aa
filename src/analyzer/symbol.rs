use ordered_float::NotNan;
use serde::Serialize;
use std::fmt::{self, Display};

/// Column type as resolved by analysis. Only the distinctions the planner
/// cares about are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Integer,
    Long,
    Double,
    String,
    Object,
    Array,
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(NotNan<f64>),
    Bool(bool),
    Null,
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(n) => write!(f, "{}", n.into_inner()),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(_) => write!(f, "String({})", self),
            Literal::Int(_) => write!(f, "Int({})", self),
            Literal::Float(_) => write!(f, "Float({})", self),
            Literal::Bool(_) => write!(f, "Bool({})", self),
            Literal::Null => write!(f, "Null"),
        }
    }
}

/// A resolved column of the queried table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    pub table: String,
    pub column: String,
    pub data_type: DataType,
}

impl Reference {
    pub fn new(table: &str, column: &str, data_type: DataType) -> Self {
        Self { table: table.to_string(), column: column.to_string(), data_type }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Function {
    pub name: String,            // normalized lowercase
    pub args: Vec<Symbol>,
}

impl Function {
    pub fn new(name: &str, args: Vec<Symbol>) -> Self {
        Self { name: name.to_ascii_lowercase(), args }
    }

    pub fn is_aggregate(&self) -> bool {
        Self::is_aggregate_name(&self.name)
    }

    pub fn is_aggregate_name(name: &str) -> bool {
        matches!(
            name.to_ascii_lowercase().as_str(),
            "count" | "sum" | "avg" | "min" | "max" | "arbitrary" | "collect_set"
        )
    }
}

/// Expression tree handed to the planner after analysis.
///
/// `InputColumn` only appears inside projections: it addresses a column of the
/// row stream produced by the previous step.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Symbol {
    Literal(Literal),
    Reference(Reference),
    Function(Function),
    InputColumn(usize),
    Parameter(usize),
}

impl Symbol {
    pub fn literal_int(value: i64) -> Self {
        Symbol::Literal(Literal::Int(value))
    }

    pub fn reference(table: &str, column: &str, data_type: DataType) -> Self {
        Symbol::Reference(Reference::new(table, column, data_type))
    }

    pub fn function(name: &str, args: Vec<Symbol>) -> Self {
        Symbol::Function(Function::new(name, args))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Symbol::Function(f) if f.is_aggregate())
    }

    /// True if `pred` holds for this symbol or any symbol nested in it.
    pub fn any(&self, pred: &dyn Fn(&Symbol) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Symbol::Function(f) => f.args.iter().any(|a| a.any(pred)),
            _ => false,
        }
    }

    pub fn references_column(&self, column: &str) -> bool {
        self.any(&|s| matches!(s, Symbol::Reference(r) if r.column == column))
    }

    pub fn input_columns(count: usize) -> Vec<Symbol> {
        (0..count).map(Symbol::InputColumn).collect()
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Literal(l) => write!(f, "{}", l),
            Symbol::Reference(r) => write!(f, "{}.{}", r.table, r.column),
            Symbol::Function(fun) => {
                write!(f, "{}(", fun.name)?;
                for (i, arg) in fun.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Symbol::InputColumn(idx) => write!(f, "INPUT({})", idx),
            Symbol::Parameter(idx) => write!(f, "${}", idx + 1),
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Literal(_) => write!(f, "Literal({})", self),
            Symbol::Reference(_) => write!(f, "Reference({})", self),
            Symbol::Function(_) => write!(f, "Function({})", self),
            Symbol::InputColumn(_) => write!(f, "{}", self),
            Symbol::Parameter(_) => write!(f, "Parameter({})", self),
        }
    }
}
