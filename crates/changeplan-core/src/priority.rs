//! Impact-adjusted test priorities.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::catalog::TestCatalog;
use crate::impact::ImpactLevel;

/// A selected test category with its adjusted priority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrioritizedTest {
    #[serde(rename = "test_category")]
    pub category: String,
    pub priority: u32,
}

impl PrioritizedTest {
    pub fn new(category: impl Into<String>, priority: u32) -> Self {
        Self {
            category: category.into(),
            priority,
        }
    }

    /// Scheduling order: priority descending, then name ascending.
    pub fn schedule_order(a: &PrioritizedTest, b: &PrioritizedTest) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.category.cmp(&b.category))
    }
}

/// Scale `base` by the impact multiplier, rounding half away from zero.
pub fn adjust_priority(base: u32, level: ImpactLevel) -> u32 {
    let scaled = u64::from(base) * u64::from(level.multiplier_percent());
    u32::try_from((scaled + 50) / 100).unwrap_or(u32::MAX)
}

/// Prioritize every category, returned in scheduling order.
pub fn prioritize(
    categories: &[String],
    catalog: &TestCatalog,
    level: ImpactLevel,
) -> Vec<PrioritizedTest> {
    let mut tests: Vec<PrioritizedTest> = categories
        .iter()
        .map(|name| PrioritizedTest::new(name.clone(), adjust_priority(catalog.priority(name), level)))
        .collect();
    tests.sort_by(PrioritizedTest::schedule_order);
    tests.dedup_by(|a, b| a.category == b.category);
    tests
}
