pub mod row_granularity;
pub use row_granularity::*;

pub mod table_info;
pub use table_info::*;

pub mod hash_function;
pub use hash_function::*;

pub mod cluster_state;
pub use cluster_state::*;

pub mod routing;
pub use routing::*;

pub mod routing_provider;
pub use routing_provider::*;
