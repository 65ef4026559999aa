pub mod symbol;
pub use symbol::*;

pub mod order_by;
pub use order_by::*;

pub mod where_clause;
pub use where_clause::*;

pub mod query_spec;
pub use query_spec::*;

pub mod relation;
pub use relation::*;

pub mod split_points;
pub use split_points::*;
