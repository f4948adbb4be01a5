//! End-to-end planning: changed paths in, execution plan out.
//!
//! Stages run in a fixed order (classify, assess, map, prioritize, group,
//! filter, estimate, emit). Every stage is a pure function of its inputs,
//! so identical requests produce identical plans.

use chrono::{DateTime, Utc};

use crate::classify::RuleTable;
use crate::config::PlannerConfig;
use crate::error::PlanResult;
use crate::estimate::estimate;
use crate::filter::{apply_floor, SelectionMode};
use crate::grouping::{dependency_violations, group_tests, ExecutionGroup, GroupingStrategy};
use crate::impact::assess;
use crate::mapper::infer_test_categories;
use crate::obs::{self, PlanSpan};
use crate::plan::{emit, ChangeSummary, ExecutionPlan, PlanParts};
use crate::priority::prioritize;
use crate::report::ChangeAnalysisDocument;

/// One planning run.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub changed_paths: Vec<String>,
    pub branch: String,
    /// Overrides the branch policy's selection mode when set.
    pub mode_override: Option<String>,
    /// Overrides the configured grouping strategy when set.
    pub grouping: Option<GroupingStrategy>,
    pub generated_at: DateTime<Utc>,
}

impl PlanRequest {
    pub fn new(
        changed_paths: Vec<String>,
        branch: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            changed_paths,
            branch: branch.into(),
            mode_override: None,
            grouping: None,
            generated_at,
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode_override = Some(mode.into());
        self
    }

    pub fn with_grouping(mut self, grouping: GroupingStrategy) -> Self {
        self.grouping = Some(grouping);
        self
    }
}

/// Classification rules plus resolved configuration.
#[derive(Debug, Clone)]
pub struct Planner {
    rules: RuleTable,
    config: PlannerConfig,
}

impl Planner {
    /// Built-in rules with `config`.
    pub fn new(config: PlannerConfig) -> PlanResult<Self> {
        Ok(Self {
            rules: RuleTable::builtin()?,
            config,
        })
    }

    pub fn with_rules(rules: RuleTable, config: PlannerConfig) -> Self {
        Self { rules, config }
    }

    pub fn builtin() -> PlanResult<Self> {
        Self::new(PlannerConfig::builtin()?)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Classification, impact, and inferred categories without planning.
    pub fn analyze<S: AsRef<str>>(
        &self,
        paths: &[S],
        generated_at: DateTime<Utc>,
    ) -> ChangeAnalysisDocument {
        let analysis = self.rules.classify(paths);
        let impact = assess(&analysis);
        let categories = infer_test_categories(&analysis);
        ChangeAnalysisDocument::new(generated_at, &analysis, impact, &categories)
    }

    /// Run every stage for `request`.
    ///
    /// Fails only with [`crate::PlanError::DependencyCycle`]; every other
    /// irregularity is recorded in the plan's `diagnostics`.
    pub fn plan(&self, request: &PlanRequest) -> PlanResult<ExecutionPlan> {
        let branch = request.branch.trim();
        let branch = branch.strip_prefix("refs/heads/").unwrap_or(branch);
        let policy = self.config.policies.resolve(branch);
        let catalog = &self.config.catalog;
        let grouping = request.grouping.unwrap_or(self.config.grouping);

        let _span = PlanSpan::enter(branch);
        obs::emit_plan_started(branch, &policy.name, request.changed_paths.len());

        let mut diagnostics = self.config.warnings.clone();

        let analysis = self.rules.classify(&request.changed_paths);
        obs::emit_changes_classified(
            analysis.total_changed,
            analysis.classified_count(),
            analysis.unclassified.len(),
        );
        if analysis.is_empty() {
            diagnostics.push(if analysis.total_changed == 0 {
                "no changed paths; nothing to test".to_string()
            } else {
                format!(
                    "none of the {} changed path(s) matched a classification rule; nothing to test",
                    analysis.total_changed
                )
            });
        }

        let impact = assess(&analysis);
        obs::emit_impact_assessed(&impact);

        let categories = infer_test_categories(&analysis);
        for name in categories.iter().filter(|c| !catalog.contains(c.as_str())) {
            diagnostics.push(format!(
                "test category '{}' is not in the catalog; using default priority and duration",
                name
            ));
        }

        let tests = prioritize(&categories, catalog, impact.level);
        let groups = match group_tests(&tests, catalog, grouping) {
            Ok(groups) => groups,
            Err(e) => {
                obs::emit_plan_aborted(&e);
                return Err(e);
            }
        };
        obs::emit_tests_grouped(grouping.as_str(), tests.len(), groups.len());

        let raw_mode = request
            .mode_override
            .as_deref()
            .unwrap_or(&policy.selection_mode);
        let (mode, recognized) = SelectionMode::parse_lenient(raw_mode);
        if !recognized {
            diagnostics.push(format!(
                "unrecognised selection mode '{}'; using {}",
                raw_mode.trim(),
                mode
            ));
        }

        let floor = mode.priority_floor(policy.allow_skipping);
        let filtered = apply_floor(&groups, floor);
        let kept: usize = filtered.iter().map(ExecutionGroup::len).sum();
        obs::emit_tests_filtered(mode.as_str(), floor, kept, tests.len() - kept);
        if kept == 0 && !tests.is_empty() {
            diagnostics.push(format!(
                "every selected test fell below the {} priority floor of {}",
                mode,
                floor.unwrap_or_default()
            ));
        }

        if grouping == GroupingStrategy::Legacy {
            diagnostics.extend(
                dependency_violations(&filtered, catalog)
                    .into_iter()
                    .map(|v| format!("legacy grouping: {}", v)),
            );
        }

        for message in &diagnostics {
            obs::emit_plan_diagnostic(message);
        }

        let plan = emit(PlanParts {
            timestamp: request.generated_at,
            mode: mode.as_str().to_string(),
            branch: branch.to_string(),
            grouping,
            time_estimates: estimate(&filtered, catalog),
            groups: filtered,
            policy: policy.clone(),
            change_summary: ChangeSummary::new(&analysis, impact, &categories),
            diagnostics,
        });
        obs::emit_plan_emitted(&plan.mode, plan.total_tests, &plan.plan_digest);
        Ok(plan)
    }
}
