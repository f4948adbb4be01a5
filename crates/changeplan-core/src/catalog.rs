//! Test category catalog: base priority, duration, and dependencies.
//!
//! The catalog is an explicit, immutable value passed into every stage that
//! needs it. Categories absent from the catalog resolve to [`UNKNOWN_ENTRY`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Entry used for categories the catalog does not know.
pub static UNKNOWN_ENTRY: CatalogEntry = CatalogEntry {
    priority: 50,
    duration_minutes: 5,
    dependencies: BTreeSet::new(),
};

/// Priority, duration, and prerequisites of one test category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub priority: u32,
    pub duration_minutes: u32,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

impl CatalogEntry {
    pub fn new(priority: u32, duration_minutes: u32, dependencies: &[&str]) -> Self {
        Self {
            priority,
            duration_minutes,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Registry of [`CatalogEntry`] keyed by test category name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl TestCatalog {
    /// An empty catalog: every lookup yields [`UNKNOWN_ENTRY`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        [
            ("basic_validation", CatalogEntry::new(100, 2, &[])),
            (
                "terraform_validation",
                CatalogEntry::new(95, 5, &["basic_validation"]),
            ),
            (
                "sql_validation_tests",
                CatalogEntry::new(90, 5, &["basic_validation"]),
            ),
            ("rbac_tests", CatalogEntry::new(85, 8, &["terraform_validation"])),
            ("pipeline_tests", CatalogEntry::new(85, 10, &["basic_validation"])),
            (
                "flink_transformation_tests",
                CatalogEntry::new(80, 15, &["terraform_validation", "sql_validation_tests"]),
            ),
            ("security_validation", CatalogEntry::new(80, 10, &["rbac_tests"])),
            ("ci_cd_validation", CatalogEntry::new(75, 5, &["pipeline_tests"])),
            (
                "flink_compute_pool_tests",
                CatalogEntry::new(75, 10, &["terraform_validation"]),
            ),
            ("schema_tests", CatalogEntry::new(75, 6, &["terraform_validation"])),
            (
                "transformation_accuracy_tests",
                CatalogEntry::new(75, 20, &["flink_transformation_tests"]),
            ),
            ("connector_tests", CatalogEntry::new(70, 12, &["terraform_validation"])),
            (
                "streaming_tests",
                CatalogEntry::new(70, 15, &["flink_transformation_tests"]),
            ),
            (
                "data_validation_tests",
                CatalogEntry::new(70, 10, &["transformation_accuracy_tests"]),
            ),
            (
                "validation_query_tests",
                CatalogEntry::new(65, 10, &["sql_validation_tests"]),
            ),
            ("integration_tests", CatalogEntry::new(60, 25, &["ci_cd_validation"])),
            ("data_format_validation", CatalogEntry::new(60, 6, &["schema_tests"])),
            ("smt_tests", CatalogEntry::new(60, 8, &["connector_tests"])),
            (
                "resource_allocation_tests",
                CatalogEntry::new(55, 8, &["flink_compute_pool_tests"]),
            ),
            (
                "performance_validation_tests",
                CatalogEntry::new(40, 30, &["streaming_tests"]),
            ),
        ]
        .into_iter()
        .fold(Self::empty(), |catalog, (name, entry)| {
            catalog.with_entry(name, entry)
        })
    }

    /// Insert or replace an entry (builder pattern).
    pub fn with_entry(mut self, name: impl Into<String>, entry: CatalogEntry) -> Self {
        self.entries.insert(name.into(), entry);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry for `name`, or [`UNKNOWN_ENTRY`].
    pub fn lookup(&self, name: &str) -> &CatalogEntry {
        self.entries.get(name).unwrap_or(&UNKNOWN_ENTRY)
    }

    pub fn priority(&self, name: &str) -> u32 {
        self.lookup(name).priority
    }

    pub fn duration_minutes(&self, name: &str) -> u32 {
        self.lookup(name).duration_minutes
    }

    pub fn dependencies(&self, name: &str) -> &BTreeSet<String> {
        &self.lookup(name).dependencies
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CatalogEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
