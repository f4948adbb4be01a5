//! Weighted impact scoring.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::{ChangeAnalysis, FileCategory};

/// Score at or above which a change is [`ImpactLevel::High`].
pub const HIGH_THRESHOLD: u32 = 30;
/// Score at or above which a change is [`ImpactLevel::Medium`].
pub const MEDIUM_THRESHOLD: u32 = 15;

/// Discrete impact bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// Nothing classifiable changed; no tests are required.
    None,
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::None => "none",
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        }
    }

    /// Priority multiplier expressed in percent.
    pub fn multiplier_percent(&self) -> u32 {
        match self {
            ImpactLevel::High => 120,
            ImpactLevel::Medium | ImpactLevel::None => 100,
            ImpactLevel::Low => 80,
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score and level derived from per-category counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub score: u32,
    pub level: ImpactLevel,
}

/// Per-file weight of a category. Categories without a weight contribute 0.
pub fn category_weight(category: FileCategory) -> u32 {
    match category {
        FileCategory::Terraform => 10,
        FileCategory::FlinkSql => 15,
        FileCategory::Ci => 20,
        _ => 0,
    }
}

/// Assess the impact of a change set from its category counts alone.
pub fn assess(analysis: &ChangeAnalysis) -> ImpactAssessment {
    if analysis.is_empty() {
        return ImpactAssessment {
            score: 0,
            level: ImpactLevel::None,
        };
    }

    let score = analysis
        .counts_by_category
        .iter()
        .map(|(category, count)| {
            u32::try_from(*count)
                .unwrap_or(u32::MAX)
                .saturating_mul(category_weight(*category))
        })
        .fold(0u32, u32::saturating_add);

    let level = if score >= HIGH_THRESHOLD {
        ImpactLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        ImpactLevel::Medium
    } else {
        ImpactLevel::Low
    };

    ImpactAssessment { score, level }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(counts: &[(FileCategory, usize)]) -> ChangeAnalysis {
        let mut a = ChangeAnalysis::default();
        for (category, count) in counts {
            a.counts_by_category.insert(*category, *count);
            a.files_by_category.insert(
                *category,
                (0..*count).map(|i| format!("{}/{}", category, i)).collect(),
            );
            a.total_changed += count;
        }
        a
    }

    #[test]
    fn test_empty_change_set_is_none() {
        let result = assess(&ChangeAnalysis::default());
        assert_eq!(result.score, 0);
        assert_eq!(result.level, ImpactLevel::None);
    }

    #[test]
    fn test_single_terraform_file_is_low() {
        let result = assess(&analysis(&[(FileCategory::Terraform, 1)]));
        assert_eq!(result.score, 10);
        assert_eq!(result.level, ImpactLevel::Low);
    }

    #[test]
    fn test_single_ci_file_is_medium() {
        let result = assess(&analysis(&[(FileCategory::Ci, 1)]));
        assert_eq!(result.score, 20);
        assert_eq!(result.level, ImpactLevel::Medium);
    }

    #[test]
    fn test_mixed_change_is_high() {
        let result = assess(&analysis(&[(FileCategory::Terraform, 3), (FileCategory::Ci, 1)]));
        assert_eq!(result.score, 50);
        assert_eq!(result.level, ImpactLevel::High);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        assert_eq!(
            assess(&analysis(&[(FileCategory::FlinkSql, 1)])).level,
            ImpactLevel::Medium
        );
        assert_eq!(
            assess(&analysis(&[(FileCategory::FlinkSql, 2)])).level,
            ImpactLevel::High
        );
    }

    #[test]
    fn test_unweighted_categories_score_zero_but_are_low() {
        let result = assess(&analysis(&[(FileCategory::Docs, 4), (FileCategory::Scripts, 2)]));
        assert_eq!(result.score, 0);
        assert_eq!(result.level, ImpactLevel::Low);
    }

    #[test]
    fn test_multiplier_percent() {
        assert_eq!(ImpactLevel::High.multiplier_percent(), 120);
        assert_eq!(ImpactLevel::Medium.multiplier_percent(), 100);
        assert_eq!(ImpactLevel::Low.multiplier_percent(), 80);
        assert_eq!(ImpactLevel::None.multiplier_percent(), 100);
    }
}
