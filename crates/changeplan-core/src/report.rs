//! Persisted JSON documents and the writers for them.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{ChangeAnalysis, FileCategory};
use crate::error::PlanResult;
use crate::impact::ImpactAssessment;
use crate::plan::ExecutionPlan;

/// Change-analysis document written next to the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAnalysisDocument {
    pub timestamp: DateTime<Utc>,
    pub file_counts: BTreeMap<FileCategory, usize>,
    pub changed_files: BTreeMap<FileCategory, Vec<String>>,
    pub unclassified_files: Vec<String>,
    pub total_changed_files: usize,
    pub impact_analysis: ImpactAssessment,
    pub test_categories: Vec<String>,
}

impl ChangeAnalysisDocument {
    pub fn new(
        timestamp: DateTime<Utc>,
        analysis: &ChangeAnalysis,
        impact: ImpactAssessment,
        test_categories: &[String],
    ) -> Self {
        Self {
            timestamp,
            file_counts: analysis.counts_by_category.clone(),
            changed_files: analysis.files_by_category.clone(),
            unclassified_files: analysis.unclassified.clone(),
            total_changed_files: analysis.total_changed,
            impact_analysis: impact,
            test_categories: test_categories.to_vec(),
        }
    }
}

/// Write any document as pretty JSON with a trailing newline.
pub fn write_json<T: Serialize>(path: &Path, document: &T) -> PlanResult<()> {
    let mut content = serde_json::to_string_pretty(document)?;
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}

pub fn write_plan_json(path: &Path, plan: &ExecutionPlan) -> PlanResult<()> {
    write_json(path, plan)
}

pub fn write_analysis_json(path: &Path, document: &ChangeAnalysisDocument) -> PlanResult<()> {
    write_json(path, document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RuleTable;
    use crate::impact::assess;
    use crate::mapper::infer_test_categories;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .expect("parse RFC3339")
            .with_timezone(&Utc)
    }

    fn document(paths: &[&str]) -> ChangeAnalysisDocument {
        let analysis = RuleTable::builtin().unwrap().classify(paths);
        let impact = assess(&analysis);
        let categories = infer_test_categories(&analysis);
        ChangeAnalysisDocument::new(fixed_time(), &analysis, impact, &categories)
    }

    #[test]
    fn test_document_keys_use_category_names() {
        let doc = document(&["flink/sql/orders.sql", "README.md", "Makefile"]);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["file_counts"]["flink_sql"], 1);
        assert_eq!(json["file_counts"]["docs"], 1);
        assert_eq!(json["changed_files"]["flink_sql"][0], "flink/sql/orders.sql");
        assert_eq!(json["unclassified_files"][0], "Makefile");
        assert_eq!(json["total_changed_files"], 3);
        assert_eq!(json["impact_analysis"]["score"], 15);
        assert_eq!(json["impact_analysis"]["level"], "medium");
    }

    #[test]
    fn test_write_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("change_analysis.json");
        let doc = document(&["terraform/main.tf"]);

        write_analysis_json(&path, &doc).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        let back: ChangeAnalysisDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_write_json_into_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("plan.json");
        let err = write_json(&path, &document(&[])).unwrap_err();
        assert!(matches!(err, crate::error::PlanError::Io(_)));
    }
}
