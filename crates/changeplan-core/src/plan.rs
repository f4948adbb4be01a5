//! The execution plan handed to the downstream test runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classify::ChangeAnalysis;
use crate::estimate::TimeEstimate;
use crate::grouping::{ExecutionGroup, GroupingStrategy};
use crate::impact::{ImpactAssessment, ImpactLevel};
use crate::policy::BranchPolicy;

/// `mode` value of a plan that runs nothing.
pub const SKIP_MODE: &str = "skip";
/// Retries the runner is allowed per failed test category.
pub const MAX_RETRIES: u32 = 2;

/// Branch policy fields copied into the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfiguration {
    pub policy: String,
    /// Minutes.
    pub max_execution_time: u32,
    pub required_coverage: u32,
    pub parallel_limit: u32,
    pub allow_test_skipping: bool,
}

impl From<&BranchPolicy> for PlanConfiguration {
    fn from(policy: &BranchPolicy) -> Self {
        Self {
            policy: policy.name.clone(),
            max_execution_time: policy.max_execution_minutes,
            required_coverage: policy.required_coverage,
            parallel_limit: policy.parallel_limit,
            allow_test_skipping: policy.allow_skipping,
        }
    }
}

/// What changed and how much it matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub impact_level: ImpactLevel,
    pub impact_score: u32,
    pub changed_files_count: usize,
    pub unclassified_files_count: usize,
    /// Test categories inferred from the change, before filtering.
    pub affected_categories: Vec<String>,
}

impl ChangeSummary {
    pub fn new(analysis: &ChangeAnalysis, impact: ImpactAssessment, categories: &[String]) -> Self {
        Self {
            impact_level: impact.level,
            impact_score: impact.score,
            changed_files_count: analysis.total_changed,
            unclassified_files_count: analysis.unclassified.len(),
            affected_categories: categories.to_vec(),
        }
    }
}

/// Instructions for the runner. Retries are the runner's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStrategy {
    pub parallel_execution: bool,
    pub fail_fast: bool,
    pub retry_failed: bool,
    pub max_retries: u32,
}

impl ExecutionStrategy {
    pub fn for_branch(branch: &str, policy: &BranchPolicy) -> Self {
        Self {
            parallel_execution: policy.parallel_limit > 1,
            fail_fast: branch != "main",
            retry_failed: true,
            max_retries: MAX_RETRIES,
        }
    }

    /// Strategy for a plan with nothing to run.
    pub fn skip(branch: &str) -> Self {
        Self {
            parallel_execution: false,
            fail_fast: branch != "main",
            retry_failed: false,
            max_retries: 0,
        }
    }
}

/// Immutable, ordered, time-estimated execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub branch: String,
    pub grouping: GroupingStrategy,
    pub total_tests: usize,
    pub execution_groups: Vec<ExecutionGroup>,
    pub time_estimates: TimeEstimate,
    pub configuration: PlanConfiguration,
    pub change_summary: ChangeSummary,
    pub execution_strategy: ExecutionStrategy,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    /// Hex SHA-256 over the ordered groups; stable across timestamps.
    pub plan_digest: String,
}

impl ExecutionPlan {
    pub fn is_skip(&self) -> bool {
        self.mode == SKIP_MODE
    }

    /// Every planned category in execution order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.execution_groups.iter().flat_map(ExecutionGroup::categories)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Everything the emitter needs; assembled by the pipeline.
#[derive(Debug, Clone)]
pub struct PlanParts {
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub branch: String,
    pub grouping: GroupingStrategy,
    pub groups: Vec<ExecutionGroup>,
    pub time_estimates: TimeEstimate,
    pub policy: BranchPolicy,
    pub change_summary: ChangeSummary,
    pub diagnostics: Vec<String>,
}

/// Assemble the final plan.
///
/// A plan whose change summary has [`ImpactLevel::None`] is emitted in
/// [`SKIP_MODE`] with no groups.
pub fn emit(parts: PlanParts) -> ExecutionPlan {
    let skip = parts.change_summary.impact_level == ImpactLevel::None;
    let (mode, groups, time_estimates, strategy) = if skip {
        (
            SKIP_MODE.to_string(),
            Vec::new(),
            TimeEstimate::default(),
            ExecutionStrategy::skip(&parts.branch),
        )
    } else {
        let strategy = ExecutionStrategy::for_branch(&parts.branch, &parts.policy);
        (parts.mode, parts.groups, parts.time_estimates, strategy)
    };

    ExecutionPlan {
        timestamp: parts.timestamp,
        total_tests: groups.iter().map(ExecutionGroup::len).sum(),
        plan_digest: compute_plan_digest(&groups),
        mode,
        branch: parts.branch,
        grouping: parts.grouping,
        execution_groups: groups,
        time_estimates,
        configuration: PlanConfiguration::from(&parts.policy),
        change_summary: parts.change_summary,
        execution_strategy: strategy,
        diagnostics: parts.diagnostics,
    }
}

/// Deterministic digest of ordered groups, tests, and priorities.
pub fn compute_plan_digest(groups: &[ExecutionGroup]) -> String {
    let mut hasher = Sha256::new();
    for (idx, group) in groups.iter().enumerate() {
        hasher.update(format!("group:{}", idx).as_bytes());
        hasher.update(b"\0");
        for test in group.tests() {
            hasher.update(test.category.as_bytes());
            hasher.update(b":");
            hasher.update(test.priority.to_string().as_bytes());
            hasher.update(b"\0");
        }
    }
    hex::encode(hasher.finalize())
}
