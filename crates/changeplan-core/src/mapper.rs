//! Test category inference from a classified change set.
//!
//! Each guard contributes zero or more test category names to a set; the
//! result is returned sorted so that downstream stages never observe
//! collection iteration order.

use std::collections::BTreeSet;

use crate::classify::{ChangeAnalysis, FileCategory};

/// Contributed whenever no guard below fires.
pub const FALLBACK_CATEGORY: &str = "basic_validation";

/// A path-substring guard over the files of one change category.
struct PathRule {
    needles: &'static [&'static str],
    categories: &'static [&'static str],
}

const TERRAFORM_ALWAYS: &[&str] = &["terraform_validation", "basic_validation"];

const TERRAFORM_PATH_RULES: &[PathRule] = &[
    PathRule {
        needles: &["flink"],
        categories: &[
            "flink_transformation_tests",
            "streaming_tests",
            "performance_validation_tests",
        ],
    },
    PathRule {
        needles: &["compute-pool"],
        categories: &["flink_compute_pool_tests", "resource_allocation_tests"],
    },
    PathRule {
        needles: &["connector", "smt"],
        categories: &["connector_tests", "smt_tests"],
    },
    PathRule {
        needles: &["rbac"],
        categories: &["rbac_tests", "security_validation"],
    },
    PathRule {
        needles: &["schema"],
        categories: &["schema_tests", "data_format_validation"],
    },
];

const FLINK_SQL_ALWAYS: &[&str] = &[
    "transformation_accuracy_tests",
    "sql_validation_tests",
    "flink_transformation_tests",
];

const FLINK_SQL_PATH_RULES: &[PathRule] = &[
    PathRule {
        needles: &["transformation"],
        categories: &["data_validation_tests"],
    },
    PathRule {
        needles: &["test"],
        categories: &["validation_query_tests"],
    },
];

const CI_ALWAYS: &[&str] = &["pipeline_tests", "ci_cd_validation", "integration_tests"];

/// Infer the affected test categories, sorted lexicographically.
///
/// An empty analysis yields an empty list; a non-empty analysis where no
/// guard fires yields [`FALLBACK_CATEGORY`] alone.
pub fn infer_test_categories(analysis: &ChangeAnalysis) -> Vec<String> {
    if analysis.is_empty() {
        return Vec::new();
    }

    let mut selected: BTreeSet<&'static str> = BTreeSet::new();

    apply_guards(
        analysis.files(FileCategory::Terraform),
        TERRAFORM_ALWAYS,
        TERRAFORM_PATH_RULES,
        &mut selected,
    );
    apply_guards(
        analysis.files(FileCategory::FlinkSql),
        FLINK_SQL_ALWAYS,
        FLINK_SQL_PATH_RULES,
        &mut selected,
    );
    apply_guards(
        analysis.files(FileCategory::Ci),
        CI_ALWAYS,
        &[],
        &mut selected,
    );

    if selected.is_empty() {
        selected.insert(FALLBACK_CATEGORY);
    }

    selected.into_iter().map(str::to_string).collect()
}

fn apply_guards(
    files: &[String],
    always: &[&'static str],
    rules: &[PathRule],
    selected: &mut BTreeSet<&'static str>,
) {
    if files.is_empty() {
        return;
    }
    selected.extend(always.iter().copied());
    for rule in rules {
        let hit = files
            .iter()
            .any(|path| rule.needles.iter().any(|needle| path.contains(*needle)));
        if hit {
            selected.extend(rule.categories.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RuleTable;

    fn infer(paths: &[&str]) -> Vec<String> {
        let table = RuleTable::builtin().expect("builtin rules compile");
        infer_test_categories(&table.classify(paths))
    }

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        v.sort();
        v
    }

    #[test]
    fn test_flink_module_change() {
        assert_eq!(
            infer(&["terraform/modules/flink-enrichment/main.tf"]),
            sorted(&[
                "terraform_validation",
                "basic_validation",
                "flink_transformation_tests",
                "streaming_tests",
                "performance_validation_tests",
            ])
        );
    }

    #[test]
    fn test_ci_change() {
        assert_eq!(
            infer(&[".gitlab-ci.yml"]),
            sorted(&["pipeline_tests", "ci_cd_validation", "integration_tests"])
        );
    }

    #[test]
    fn test_empty_change_set_has_no_categories() {
        assert!(infer(&[]).is_empty());
        assert!(infer(&["src/main.rs"]).is_empty());
    }

    #[test]
    fn test_docs_only_change_falls_back_to_basic_validation() {
        assert_eq!(infer(&["docs/runbook.md"]), vec!["basic_validation".to_string()]);
    }

    #[test]
    fn test_connector_and_smt_share_categories() {
        let from_connector = infer(&["terraform/modules/kafka-connector/main.tf"]);
        let from_smt = infer(&["terraform/modules/smt-transforms/main.tf"]);
        assert_eq!(from_connector, from_smt);
        assert!(from_connector.contains(&"connector_tests".to_string()));
        assert!(from_connector.contains(&"smt_tests".to_string()));
    }

    #[test]
    fn test_rbac_and_schema_guards() {
        let categories = infer(&[
            "terraform/modules/rbac/roles.tf",
            "terraform/modules/schema-registry/main.tf",
        ]);
        for expected in [
            "rbac_tests",
            "security_validation",
            "schema_tests",
            "data_format_validation",
        ] {
            assert!(categories.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_flink_sql_conditional_categories() {
        let plain = infer(&["flink/sql/enrich.sql"]);
        assert_eq!(
            plain,
            sorted(&[
                "transformation_accuracy_tests",
                "sql_validation_tests",
                "flink_transformation_tests",
            ])
        );

        let with_both = infer(&["flink/sql/transformations/enrich.sql", "flink/tests/enrich_test.sql"]);
        assert!(with_both.contains(&"data_validation_tests".to_string()));
        assert!(with_both.contains(&"validation_query_tests".to_string()));
    }

    #[test]
    fn test_duplicate_contributions_collapse() {
        let categories = infer(&[
            "terraform/modules/flink-enrichment/main.tf",
            "flink/sql/enrich.sql",
        ]);
        let count = categories
            .iter()
            .filter(|c| c.as_str() == "flink_transformation_tests")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_terraform_tests_only_falls_back() {
        assert_eq!(
            infer(&["terraform/modules/flink-testing/main.tf"]),
            vec!["basic_validation".to_string()]
        );
    }
}
