pub mod planner_config;
pub use planner_config::*;

pub mod context;
pub use context::*;

pub mod distribution;
pub use distribution::*;

pub mod projection;
pub use projection::*;

pub mod projection_builder;
pub use projection_builder::*;

pub mod phases;
pub use phases::*;

pub mod plan;
pub use plan::*;

pub mod logical_plan;
pub use logical_plan::*;

pub mod materializer;
pub use materializer::*;

pub mod plan_builder;
pub use plan_builder::*;

pub mod group_by_optimizer;
pub use group_by_optimizer::*;

pub mod count_planner;
pub use count_planner::*;

#[allow(clippy::module_inception)]
pub mod planner;
pub use planner::*;

#[cfg(test)]
mod _tests;
