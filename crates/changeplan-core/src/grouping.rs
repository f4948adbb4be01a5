//! Dependency-respecting execution grouping.
//!
//! Arranges prioritized tests into ordered [`ExecutionGroup`]s. Only
//! dependencies that are themselves selected constrain the order; a
//! dependency that was not selected is treated as already satisfied.
//!
//! Two strategies are available:
//!
//! - [`GroupingStrategy::Layered`] (default) is a layered variant of Kahn's
//!   algorithm: each group holds every remaining test whose selected
//!   dependencies were all placed in strictly earlier groups.
//! - [`GroupingStrategy::Legacy`] is the single-pass grouping older plans
//!   were produced with. It opens a new group when a test is blocked but
//!   does not re-check that test's dependencies, so a test can land in the
//!   same group as, or ahead of, something it depends on. Use
//!   [`dependency_violations`] to find such placements.
//!
//! Both strategies sort tests by priority descending, then name ascending,
//! before grouping, and both reject dependency cycles among the selected
//! tests with [`PlanError::DependencyCycle`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::TestCatalog;
use crate::error::{PlanError, PlanResult};
use crate::priority::PrioritizedTest;

/// How tests are partitioned into groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    #[default]
    Layered,
    Legacy,
}

impl GroupingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingStrategy::Layered => "layered",
            GroupingStrategy::Legacy => "legacy",
        }
    }
}

impl fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "layered" => Ok(GroupingStrategy::Layered),
            "legacy" => Ok(GroupingStrategy::Legacy),
            other => Err(format!("unknown grouping strategy: {}", other)),
        }
    }
}

/// Tests that may run concurrently. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<PrioritizedTest>",
    into = "Vec<PrioritizedTest>"
)]
pub struct ExecutionGroup {
    tests: Vec<PrioritizedTest>,
}

impl ExecutionGroup {
    /// Build a group, or `None` when `tests` is empty.
    pub fn new(tests: Vec<PrioritizedTest>) -> Option<Self> {
        if tests.is_empty() {
            None
        } else {
            Some(Self { tests })
        }
    }

    pub fn tests(&self) -> &[PrioritizedTest] {
        &self.tests
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.tests.iter().any(|t| t.category == category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|t| t.category.as_str())
    }

    /// Keep the tests matching `keep`; `None` if nothing survives.
    pub fn retain<F>(&self, mut keep: F) -> Option<Self>
    where
        F: FnMut(&PrioritizedTest) -> bool,
    {
        Self::new(self.tests.iter().filter(|t| keep(*t)).cloned().collect())
    }
}

impl TryFrom<Vec<PrioritizedTest>> for ExecutionGroup {
    type Error = String;

    fn try_from(tests: Vec<PrioritizedTest>) -> Result<Self, Self::Error> {
        Self::new(tests).ok_or_else(|| "execution group must not be empty".to_string())
    }
}

impl From<ExecutionGroup> for Vec<PrioritizedTest> {
    fn from(group: ExecutionGroup) -> Self {
        group.tests
    }
}

/// A selected test placed no later than one of its selected dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyViolation {
    pub test_category: String,
    pub dependency: String,
    pub test_group: usize,
    pub dependency_group: usize,
}

impl fmt::Display for DependencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (group {}) does not run after its dependency {} (group {})",
            self.test_category, self.test_group, self.dependency, self.dependency_group
        )
    }
}

/// Group `tests` according to `strategy`.
///
/// Every test appears in exactly one group. Returns
/// [`PlanError::DependencyCycle`] naming the categories on the cycle when the
/// selected tests depend on each other in a loop (including a test that
/// lists itself as a dependency).
pub fn group_tests(
    tests: &[PrioritizedTest],
    catalog: &TestCatalog,
    strategy: GroupingStrategy,
) -> PlanResult<Vec<ExecutionGroup>> {
    let mut ordered: Vec<PrioritizedTest> = tests.to_vec();
    ordered.sort_by(PrioritizedTest::schedule_order);
    ordered.dedup_by(|a, b| a.category == b.category);

    let graph = SelectedGraph::new(&ordered, catalog);
    let layers = graph.layers(&ordered)?;

    let groups = match strategy {
        GroupingStrategy::Layered => layers,
        GroupingStrategy::Legacy => graph.legacy_groups(&ordered),
    };

    Ok(groups
        .into_iter()
        .filter_map(ExecutionGroup::new)
        .collect())
}

/// Every placement where a test's selected dependency is not in a strictly
/// earlier group. Empty for plans produced with [`GroupingStrategy::Layered`].
pub fn dependency_violations(
    groups: &[ExecutionGroup],
    catalog: &TestCatalog,
) -> Vec<DependencyViolation> {
    let position: BTreeMap<&str, usize> = groups
        .iter()
        .enumerate()
        .flat_map(|(idx, group)| group.categories().map(move |c| (c, idx)))
        .collect();

    let mut violations = Vec::new();
    for (idx, group) in groups.iter().enumerate() {
        for test in group.tests() {
            for dep in catalog.dependencies(&test.category) {
                if let Some(&dep_idx) = position.get(dep.as_str()) {
                    if dep_idx >= idx {
                        violations.push(DependencyViolation {
                            test_category: test.category.clone(),
                            dependency: dep.clone(),
                            test_group: idx,
                            dependency_group: dep_idx,
                        });
                    }
                }
            }
        }
    }
    violations
}

/// Dependency edges restricted to the selected tests.
struct SelectedGraph<'a> {
    /// `test -> selected dependencies`
    upstream: BTreeMap<&'a str, BTreeSet<&'a str>>,
}

impl<'a> SelectedGraph<'a> {
    fn new(ordered: &'a [PrioritizedTest], catalog: &'a TestCatalog) -> Self {
        let selected: BTreeSet<&str> = ordered.iter().map(|t| t.category.as_str()).collect();
        let upstream = ordered
            .iter()
            .map(|t| {
                let deps = catalog
                    .dependencies(&t.category)
                    .iter()
                    .map(String::as_str)
                    .filter(|d| selected.contains(*d))
                    .collect();
                (t.category.as_str(), deps)
            })
            .collect();
        Self { upstream }
    }

    fn deps(&self, category: &str) -> impl Iterator<Item = &'a str> + '_ {
        self.upstream.get(category).into_iter().flatten().copied()
    }

    /// Layered Kahn's algorithm. Each layer keeps the input order.
    fn layers(&self, ordered: &[PrioritizedTest]) -> PlanResult<Vec<Vec<PrioritizedTest>>> {
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut remaining: Vec<&PrioritizedTest> = ordered.iter().collect();
        let mut layers = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<&PrioritizedTest>, Vec<&PrioritizedTest>) = remaining
                .into_iter()
                .partition(|t| self.deps(&t.category).all(|d| placed.contains(d)));

            if ready.is_empty() {
                let stuck: BTreeSet<&str> = blocked.iter().map(|t| t.category.as_str()).collect();
                return Err(PlanError::DependencyCycle {
                    categories: self.cycle_members(&stuck),
                });
            }

            placed.extend(ready.iter().map(|t| t.category.as_str()));
            layers.push(ready.into_iter().cloned().collect());
            remaining = blocked;
        }

        Ok(layers)
    }

    /// Narrow the tests Kahn's algorithm could not place down to those that
    /// reach themselves through other unplaced tests.
    fn cycle_members(&self, stuck: &BTreeSet<&str>) -> Vec<String> {
        stuck
            .iter()
            .copied()
            .filter(|t| self.reaches(t, t, stuck))
            .map(str::to_string)
            .collect()
    }

    /// Whether `target` is reachable from `from` along dependencies inside `within`.
    fn reaches(&self, from: &str, target: &str, within: &BTreeSet<&str>) -> bool {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut frontier: Vec<&str> = self.deps(from).filter(|d| within.contains(*d)).collect();
        while let Some(next) = frontier.pop() {
            if next == target {
                return true;
            }
            if seen.insert(next) {
                frontier.extend(self.deps(next).filter(|d| within.contains(*d)));
            }
        }
        false
    }

    /// Single-pass grouping kept for compatibility with older plans.
    fn legacy_groups(&self, ordered: &[PrioritizedTest]) -> Vec<Vec<PrioritizedTest>> {
        let mut processed: BTreeSet<&str> = BTreeSet::new();
        let mut groups: Vec<Vec<PrioritizedTest>> = Vec::new();
        let mut current: Vec<PrioritizedTest> = Vec::new();

        for test in ordered {
            let ready = self.deps(&test.category).all(|d| processed.contains(d));
            if !ready && !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            current.push(test.clone());
            processed.insert(test.category.as_str());
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;

    fn t(name: &str, priority: u32) -> PrioritizedTest {
        PrioritizedTest::new(name, priority)
    }

    fn names(groups: &[ExecutionGroup]) -> Vec<Vec<&str>> {
        groups.iter().map(|g| g.categories().collect()).collect()
    }

    #[test]
    fn test_layered_chain_produces_one_group_per_level() {
        let catalog = TestCatalog::builtin();
        let tests = vec![
            t("streaming_tests", 70),
            t("basic_validation", 100),
            t("terraform_validation", 95),
            t("flink_transformation_tests", 80),
        ];
        let groups = group_tests(&tests, &catalog, GroupingStrategy::Layered).unwrap();
        assert_eq!(
            names(&groups),
            vec![
                vec!["basic_validation"],
                vec!["terraform_validation"],
                vec!["flink_transformation_tests"],
                vec!["streaming_tests"],
            ]
        );
    }

    #[test]
    fn test_layered_siblings_share_a_group_in_priority_order() {
        let catalog = TestCatalog::builtin();
        let tests = vec![
            t("ci_cd_validation", 75),
            t("pipeline_tests", 85),
            t("integration_tests", 60),
            t("terraform_validation", 95),
            t("basic_validation", 100),
        ];
        let groups = group_tests(&tests, &catalog, GroupingStrategy::Layered).unwrap();
        assert_eq!(
            names(&groups),
            vec![
                vec!["basic_validation"],
                vec!["terraform_validation", "pipeline_tests"],
                vec!["ci_cd_validation"],
                vec!["integration_tests"],
            ]
        );
    }

    #[test]
    fn test_unselected_dependency_is_satisfied() {
        let catalog = TestCatalog::builtin();
        // flink_transformation_tests depends on terraform_validation and
        // sql_validation_tests; only the latter is selected.
        let tests = vec![t("flink_transformation_tests", 80), t("sql_validation_tests", 90)];
        let groups = group_tests(&tests, &catalog, GroupingStrategy::Layered).unwrap();
        assert_eq!(
            names(&groups),
            vec![vec!["sql_validation_tests"], vec!["flink_transformation_tests"]]
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let catalog = TestCatalog::empty()
            .with_entry("loop_tests", CatalogEntry::new(70, 5, &["loop_tests"]));
        let err = group_tests(&[t("loop_tests", 70)], &catalog, GroupingStrategy::Layered)
            .unwrap_err();
        match err {
            PlanError::DependencyCycle { categories } => {
                assert_eq!(categories, vec!["loop_tests".to_string()]);
            }
            other => panic!("Expected DependencyCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_report_excludes_downstream_tests() {
        let catalog = TestCatalog::empty()
            .with_entry("a", CatalogEntry::new(90, 1, &["b"]))
            .with_entry("b", CatalogEntry::new(80, 1, &["a"]))
            .with_entry("c", CatalogEntry::new(70, 1, &["a"]))
            .with_entry("root", CatalogEntry::new(100, 1, &[]));
        let tests = vec![t("a", 90), t("b", 80), t("c", 70), t("root", 100)];
        let err = group_tests(&tests, &catalog, GroupingStrategy::Layered).unwrap_err();
        match err {
            PlanError::DependencyCycle { categories } => {
                assert_eq!(categories, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("Expected DependencyCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_report_excludes_test_between_two_cycles() {
        // a <-> b and c <-> d, with x bridging them: x -> a, c -> x.
        let catalog = TestCatalog::empty()
            .with_entry("a", CatalogEntry::new(90, 1, &["b"]))
            .with_entry("b", CatalogEntry::new(80, 1, &["a"]))
            .with_entry("x", CatalogEntry::new(70, 1, &["a"]))
            .with_entry("c", CatalogEntry::new(60, 1, &["x", "d"]))
            .with_entry("d", CatalogEntry::new(50, 1, &["c"]));
        let tests = vec![t("a", 90), t("b", 80), t("x", 70), t("c", 60), t("d", 50)];
        let err = group_tests(&tests, &catalog, GroupingStrategy::Layered).unwrap_err();
        match err {
            PlanError::DependencyCycle { categories } => {
                assert_eq!(categories, vec!["a", "b", "c", "d"]);
            }
            other => panic!("Expected DependencyCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_also_rejects_cycles() {
        let catalog = TestCatalog::empty()
            .with_entry("a", CatalogEntry::new(90, 1, &["b"]))
            .with_entry("b", CatalogEntry::new(80, 1, &["a"]));
        let result = group_tests(&[t("a", 90), t("b", 80)], &catalog, GroupingStrategy::Legacy);
        assert!(matches!(result, Err(PlanError::DependencyCycle { .. })));
    }

    #[test]
    fn test_legacy_keeps_satisfied_dependents_in_the_same_group() {
        let catalog = TestCatalog::builtin();
        let tests = vec![
            t("basic_validation", 100),
            t("terraform_validation", 95),
            t("pipeline_tests", 85),
        ];
        let groups = group_tests(&tests, &catalog, GroupingStrategy::Legacy).unwrap();
        assert_eq!(
            names(&groups),
            vec![vec!["basic_validation", "terraform_validation", "pipeline_tests"]]
        );
        assert_eq!(dependency_violations(&groups, &catalog).len(), 2);
    }

    #[test]
    fn test_legacy_places_blocked_test_ahead_of_its_dependency() {
        // The dependent outranks its dependency after impact adjustment.
        let catalog = TestCatalog::empty()
            .with_entry("setup", CatalogEntry::new(10, 1, &[]))
            .with_entry("first", CatalogEntry::new(90, 1, &[]))
            .with_entry("needs_setup", CatalogEntry::new(80, 1, &["setup"]));
        let tests = vec![t("first", 90), t("needs_setup", 80), t("setup", 10)];

        let legacy = group_tests(&tests, &catalog, GroupingStrategy::Legacy).unwrap();
        assert_eq!(names(&legacy), vec![vec!["first"], vec!["needs_setup", "setup"]]);
        let violations = dependency_violations(&legacy, &catalog);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].test_category, "needs_setup");
        assert_eq!(violations[0].dependency, "setup");

        let layered = group_tests(&tests, &catalog, GroupingStrategy::Layered).unwrap();
        assert_eq!(names(&layered), vec![vec!["first", "setup"], vec!["needs_setup"]]);
        assert!(dependency_violations(&layered, &catalog).is_empty());
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        let groups = group_tests(&[], &TestCatalog::builtin(), GroupingStrategy::Layered).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_execution_group_rejects_empty() {
        assert!(ExecutionGroup::new(vec![]).is_none());
        let group = ExecutionGroup::new(vec![t("a", 1), t("b", 2)]).unwrap();
        assert!(group.retain(|t| t.priority > 5).is_none());
        assert_eq!(group.retain(|t| t.priority > 1).unwrap().len(), 1);
    }

    #[test]
    fn test_execution_group_serializes_as_array() {
        let group = ExecutionGroup::new(vec![t("basic_validation", 100)]).unwrap();
        let json = serde_json::to_string(&group).unwrap();
        assert_eq!(json, r#"[{"test_category":"basic_validation","priority":100}]"#);
    }

    #[test]
    fn test_execution_group_deserialize_rejects_empty_array() {
        assert!(serde_json::from_str::<ExecutionGroup>("[]").is_err());
        let group: ExecutionGroup =
            serde_json::from_str(r#"[{"test_category":"smt_tests","priority":60}]"#).unwrap();
        assert!(group.contains("smt_tests"));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("legacy".parse::<GroupingStrategy>(), Ok(GroupingStrategy::Legacy));
        assert_eq!(" Layered ".parse::<GroupingStrategy>(), Ok(GroupingStrategy::Layered));
        assert!("kahn".parse::<GroupingStrategy>().is_err());
    }
}
