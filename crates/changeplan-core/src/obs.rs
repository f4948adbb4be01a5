//! Structured events for each planning stage.
//!
//! Every event carries an `event` field (`plan.started`, `changes.classified`,
//! ...) so log pipelines can filter on it regardless of output format.

use tracing::{info, warn};

use crate::impact::ImpactAssessment;

/// RAII guard for a branch-scoped planning span.
///
/// ```ignore
/// let _span = PlanSpan::enter("feature/new-sink");
/// // every event below is tagged with branch = "feature/new-sink"
/// ```
pub struct PlanSpan {
    _span: tracing::span::EnteredSpan,
}

impl PlanSpan {
    pub fn enter(branch: &str) -> Self {
        let span = tracing::info_span!("changeplan.plan", branch = %branch);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_plan_started(branch: &str, policy: &str, changed_paths: usize) {
    info!(
        event = "plan.started",
        branch = %branch,
        policy = %policy,
        changed_paths = changed_paths,
    );
}

pub fn emit_changes_classified(total: usize, classified: usize, unclassified: usize) {
    info!(
        event = "changes.classified",
        total = total,
        classified = classified,
        unclassified = unclassified,
    );
}

pub fn emit_impact_assessed(impact: &ImpactAssessment) {
    info!(
        event = "impact.assessed",
        score = impact.score,
        level = %impact.level.as_str(),
    );
}

pub fn emit_tests_grouped(strategy: &str, tests: usize, groups: usize) {
    info!(
        event = "tests.grouped",
        strategy = %strategy,
        tests = tests,
        groups = groups,
    );
}

pub fn emit_tests_filtered(mode: &str, floor: Option<u32>, kept: usize, dropped: usize) {
    info!(
        event = "tests.filtered",
        mode = %mode,
        floor = ?floor,
        kept = kept,
        dropped = dropped,
    );
}

pub fn emit_plan_emitted(mode: &str, total_tests: usize, digest: &str) {
    info!(
        event = "plan.emitted",
        mode = %mode,
        total_tests = total_tests,
        plan_digest = %digest,
    );
}

/// Warning for anything the planner worked around rather than failed on.
pub fn emit_plan_diagnostic(message: &str) {
    warn!(event = "plan.diagnostic", message = %message);
}

/// Emit event: dependency cycle aborted planning (warning level).
pub fn emit_plan_aborted(error: &dyn std::fmt::Display) {
    warn!(event = "plan.aborted", error = %error);
}
