//! Fetch planning and graph loading
//!
//! Builds merge-group plans for relationship paths and executes them with a
//! bounded number of round trips

mod builder;
pub mod loader;
pub mod plan;
pub mod planner;
mod state;

#[cfg(test)]
mod loader_tests;

pub use loader::{GraphLoader, LoadOutcome, LoadStats, StatementStats};
pub use plan::{FetchMode, FetchPlan, MergeGroup, NodeOrigin, PlanNode};
pub use planner::FetchPlanner;
