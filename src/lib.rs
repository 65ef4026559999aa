pub mod error;
pub use error::{ErrorKind, ExecutionError, PlannerError, PlannerResult};

pub mod analyzer;

pub mod metadata;
pub use metadata::{ClusterState, Routing, RoutingProvider};

pub mod planner;
pub use planner::{Plan, Planner, PlannerConfig, PlannerContext};

pub mod executor;
