//! Sequential and critical-path duration estimates.
//!
//! The parallel figure assumes unlimited workers inside a group, so it is an
//! optimistic lower bound that ignores the branch's parallel limit.

use serde::{Deserialize, Serialize};

use crate::catalog::TestCatalog;
use crate::grouping::ExecutionGroup;

/// Minutes for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEstimate {
    pub sequential_minutes: u32,
    pub parallel_minutes: u32,
}

/// Minutes for a whole plan, with the per-group breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEstimate {
    #[serde(rename = "total_sequential_time")]
    pub sequential_minutes: u32,
    #[serde(rename = "estimated_parallel_time")]
    pub parallel_minutes: u32,
    #[serde(default)]
    pub per_group: Vec<GroupEstimate>,
}

pub fn estimate_group(group: &ExecutionGroup, catalog: &TestCatalog) -> GroupEstimate {
    let durations = group
        .tests()
        .iter()
        .map(|t| catalog.duration_minutes(&t.category));
    let (sequential, longest) = durations.fold((0u32, 0u32), |(sum, max), d| {
        (sum.saturating_add(d), max.max(d))
    });
    GroupEstimate {
        sequential_minutes: sequential,
        parallel_minutes: longest,
    }
}

/// Accumulate group estimates in plan order.
pub fn estimate(groups: &[ExecutionGroup], catalog: &TestCatalog) -> TimeEstimate {
    groups
        .iter()
        .map(|g| estimate_group(g, catalog))
        .fold(TimeEstimate::default(), |mut total, group| {
            total.sequential_minutes = total.sequential_minutes.saturating_add(group.sequential_minutes);
            total.parallel_minutes = total.parallel_minutes.saturating_add(group.parallel_minutes);
            total.per_group.push(group);
            total
        })
}
