//! Changed-path classification.
//!
//! Each changed path is assigned the category of the first rule in an ordered
//! [`RuleTable`] whose glob matches it. Paths no rule matches are
//! [`FileCategory::Unclassified`] and take no further part in planning.
//!
//! Globs are compiled with `literal_separator(false)`, so `*` also matches
//! `/`: `terraform/modules/flink-*` covers every file below a `flink-`
//! module directory and `*.md` covers markdown at any depth.

use std::collections::BTreeMap;
use std::fmt;

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// Coarse category of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Terraform,
    TerraformTests,
    FlinkSql,
    Scripts,
    Config,
    Ci,
    Docs,
    Unclassified,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Terraform => "terraform",
            FileCategory::TerraformTests => "terraform_tests",
            FileCategory::FlinkSql => "flink_sql",
            FileCategory::Scripts => "scripts",
            FileCategory::Config => "config",
            FileCategory::Ci => "ci",
            FileCategory::Docs => "docs",
            FileCategory::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uncompiled `(pattern, category)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub pattern: String,
    pub category: FileCategory,
}

impl ClassificationRule {
    pub fn new(pattern: impl Into<String>, category: FileCategory) -> Self {
        Self {
            pattern: pattern.into(),
            category,
        }
    }

    /// The built-in rule table, most specific patterns first.
    pub fn builtin() -> Vec<ClassificationRule> {
        use FileCategory::*;
        [
            ("terraform/modules/flink-testing/*", TerraformTests),
            ("terraform/modules/flink-*", Terraform),
            ("terraform/modules/compute-pool/*", Terraform),
            ("terraform/modules/*", Terraform),
            ("terraform/tests/*", TerraformTests),
            ("tests/terraform/*", TerraformTests),
            ("terraform/*", Terraform),
            ("*.tf", Terraform),
            ("*.tfvars", Terraform),
            ("flink/*", FlinkSql),
            ("*.sql", FlinkSql),
            (".gitlab-ci.yml", Ci),
            (".gitlab-ci/*", Ci),
            (".github/workflows/*", Ci),
            ("ci/*", Ci),
            ("scripts/*", Scripts),
            ("*.sh", Scripts),
            ("config/*", Config),
            ("*.yml", Config),
            ("*.yaml", Config),
            ("docs/*", Docs),
            ("*.md", Docs),
        ]
        .into_iter()
        .map(|(pattern, category)| ClassificationRule::new(pattern, category))
        .collect()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: ClassificationRule,
    matcher: GlobMatcher,
}

/// Ordered, compiled classification rules. First match wins.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    /// Compile `rules` in order.
    ///
    /// Returns [`PlanError::InvalidPattern`] naming the first pattern that
    /// fails to compile.
    pub fn new(rules: Vec<ClassificationRule>) -> PlanResult<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let glob = GlobBuilder::new(&rule.pattern)
                    .literal_separator(false)
                    .build()
                    .map_err(|e| PlanError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        reason: e.kind().to_string(),
                    })?;
                Ok(CompiledRule {
                    matcher: glob.compile_matcher(),
                    rule,
                })
            })
            .collect::<PlanResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Compile [`ClassificationRule::builtin`].
    pub fn builtin() -> PlanResult<Self> {
        Self::new(ClassificationRule::builtin())
    }

    pub fn rules(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Category of the first rule matching `path`.
    pub fn category_of(&self, path: &str) -> FileCategory {
        let path = normalize_path(path);
        self.rules
            .iter()
            .find(|c| c.matcher.is_match(path))
            .map(|c| c.rule.category)
            .unwrap_or(FileCategory::Unclassified)
    }

    /// Classify every path, preserving input order within each category.
    pub fn classify<S: AsRef<str>>(&self, paths: &[S]) -> ChangeAnalysis {
        let mut analysis = ChangeAnalysis::default();
        for raw in paths {
            let path = normalize_path(raw.as_ref());
            if path.is_empty() {
                continue;
            }
            analysis.total_changed += 1;
            match self.category_of(path) {
                FileCategory::Unclassified => analysis.unclassified.push(path.to_string()),
                category => {
                    *analysis.counts_by_category.entry(category).or_insert(0) += 1;
                    analysis
                        .files_by_category
                        .entry(category)
                        .or_default()
                        .push(path.to_string());
                }
            }
        }
        analysis
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix("./").unwrap_or(path)
}

/// Per-category view of one change set.
///
/// Only categories with at least one file appear in the maps, and
/// `files_by_category[c].len() == counts_by_category[c]` for every key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    pub counts_by_category: BTreeMap<FileCategory, usize>,
    pub files_by_category: BTreeMap<FileCategory, Vec<String>>,
    /// Paths no rule matched.
    pub unclassified: Vec<String>,
    /// Every non-blank input path, classified or not.
    pub total_changed: usize,
}

impl ChangeAnalysis {
    pub fn count(&self, category: FileCategory) -> usize {
        self.counts_by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn files(&self, category: FileCategory) -> &[String] {
        self.files_by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn classified_count(&self) -> usize {
        self.counts_by_category.values().sum()
    }

    /// True when no path was classified.
    pub fn is_empty(&self) -> bool {
        self.counts_by_category.is_empty()
    }
}
