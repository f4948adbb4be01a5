//! changeplan core library
//!
//! Turns a list of changed file paths into an ordered, time-estimated test
//! execution plan:
//! - Classifies paths into change categories and scores their impact
//! - Infers affected test categories and adjusts their priorities
//! - Groups tests so dependencies run in earlier groups
//! - Filters by the branch's selection mode and estimates run time

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod estimate;
pub mod filter;
pub mod grouping;
pub mod impact;
pub mod mapper;
pub mod obs;
pub mod pipeline;
pub mod plan;
pub mod policy;
pub mod priority;
pub mod report;
pub mod telemetry;

// Re-export key types
pub use catalog::{CatalogEntry, TestCatalog};
pub use classify::{ChangeAnalysis, ClassificationRule, FileCategory, RuleTable};
pub use config::PlannerConfig;
pub use error::{PlanError, PlanResult};
pub use estimate::{GroupEstimate, TimeEstimate};
pub use filter::SelectionMode;
pub use grouping::{
    dependency_violations, group_tests, DependencyViolation, ExecutionGroup, GroupingStrategy,
};
pub use impact::{ImpactAssessment, ImpactLevel};
pub use pipeline::{PlanRequest, Planner};
pub use plan::{ExecutionPlan, SKIP_MODE};
pub use policy::{BranchPolicies, BranchPolicy};
pub use priority::PrioritizedTest;
pub use report::{write_analysis_json, write_plan_json, ChangeAnalysisDocument};
pub use telemetry::init_tracing;

/// Crate version, embedded in CLI output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
