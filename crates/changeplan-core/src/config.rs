//! Planner configuration: branch policies and the test catalog.
//!
//! Configuration is an optional TOML document:
//!
//! ```toml
//! [planner]
//! grouping = "legacy"
//!
//! [branches.develop]
//! selection_mode = "targeted"
//! parallel_limit = 2
//!
//! [categories.rbac_tests]
//! priority = 92
//! dependencies = ["terraform_validation"]
//! ```
//!
//! Every field is optional and is validated on its own. A missing or
//! ill-typed field keeps its built-in value and records a warning, so a
//! partially broken document never discards the parts that are valid.

use std::path::Path;

use toml::{Table, Value};
use tracing::warn;

use crate::catalog::{CatalogEntry, TestCatalog, UNKNOWN_ENTRY};
use crate::error::{PlanError, PlanResult};
use crate::filter::SelectionMode;
use crate::grouping::GroupingStrategy;
use crate::policy::{BranchPolicies, BranchPolicy};

/// Resolved configuration handed to the planner.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub policies: BranchPolicies,
    pub catalog: TestCatalog,
    pub grouping: GroupingStrategy,
    /// Fallbacks taken while loading, one human-readable line each.
    pub warnings: Vec<String>,
}

impl PlannerConfig {
    /// Built-in policies and catalog.
    pub fn builtin() -> PlanResult<Self> {
        Ok(Self {
            policies: BranchPolicies::builtin()?,
            catalog: TestCatalog::builtin(),
            grouping: GroupingStrategy::default(),
            warnings: Vec::new(),
        })
    }

    /// Overlay a TOML document onto the built-in configuration.
    ///
    /// Returns [`PlanError::Config`] only when `source` is not valid TOML.
    pub fn from_toml_str(source: &str, origin: &Path) -> PlanResult<Self> {
        let table: Table = source.parse().map_err(|e: toml::de::Error| PlanError::Config {
            path: origin.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        let mut config = Self::builtin()?;
        config.overlay(&table);
        Ok(config)
    }

    /// Load `path`, failing on unreadable or unparsable documents.
    pub fn load(path: &Path) -> PlanResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| PlanError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source, path)
    }

    /// Load `path` if given, falling back to built-in defaults when the
    /// document cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> PlanResult<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(PlanError::Config { path, reason }) => {
                warn!(event = "config.fallback", path = %path.display(), error = %reason);
                let mut config = Self::builtin()?;
                config.warnings.push(format!(
                    "config {} ignored ({}); using built-in defaults",
                    path.display(),
                    reason
                ));
                Ok(config)
            }
            Err(other) => Err(other),
        }
    }

    fn overlay(&mut self, table: &Table) {
        for (key, value) in table {
            match (key.as_str(), value) {
                ("branches", Value::Table(branches)) => self.overlay_branches(branches),
                ("categories", Value::Table(categories)) => self.overlay_categories(categories),
                ("planner", Value::Table(planner)) => self.overlay_planner(planner),
                ("branches" | "categories" | "planner", other) => {
                    self.note(format!("'{}' must be a table, found {}", key, other.type_str()))
                }
                (other, _) => self.note(format!("unknown config section '{}' ignored", other)),
            }
        }
    }

    fn overlay_planner(&mut self, planner: &Table) {
        for (key, value) in planner {
            match (key.as_str(), value.as_str()) {
                ("grouping", Some(raw)) => match raw.parse() {
                    Ok(grouping) => self.grouping = grouping,
                    Err(e) => self.note(format!("planner.grouping: {}; keeping {}", e, self.grouping)),
                },
                ("grouping", None) => {
                    let note = type_note("planner", key, "a string", value);
                    self.note(note)
                }
                (other, _) => self.note(format!("planner.{} is not a planner field; ignored", other)),
            }
        }
    }

    fn overlay_branches(&mut self, branches: &Table) {
        for (name, value) in branches {
            let Value::Table(fields) = value else {
                self.note(format!("branches.{} must be a table", name));
                continue;
            };
            let Some(mut policy) = self.policies.get(name).cloned() else {
                self.note(format!("unknown branch policy '{}' ignored", name));
                continue;
            };
            let mut notes = Vec::new();
            apply_policy_fields(&mut policy, fields, &mut notes);
            if let Some(slot) = self.policies.get_mut(name) {
                *slot = policy;
            }
            for n in notes {
                self.note(n);
            }
        }
    }

    fn overlay_categories(&mut self, categories: &Table) {
        let mut catalog = self.catalog.clone();
        for (name, value) in categories {
            let Value::Table(fields) = value else {
                self.note(format!("categories.{} must be a table", name));
                continue;
            };
            let mut entry = catalog.get(name).cloned().unwrap_or_else(|| UNKNOWN_ENTRY.clone());
            let mut notes = Vec::new();
            apply_entry_fields(name, &mut entry, fields, &mut notes);
            catalog = catalog.with_entry(name.clone(), entry);
            for n in notes {
                self.note(n);
            }
        }
        self.catalog = catalog;
    }

    fn note(&mut self, message: String) {
        warn!(event = "config.field_ignored", detail = %message);
        self.warnings.push(message);
    }
}

fn apply_policy_fields(policy: &mut BranchPolicy, fields: &Table, notes: &mut Vec<String>) {
    let ctx = format!("branches.{}", policy.name);
    for (key, value) in fields {
        match key.as_str() {
            "selection_mode" => match value.as_str() {
                Some(mode) => {
                    if !SelectionMode::parse_lenient(mode).1 {
                        notes.push(format!(
                            "{}.selection_mode '{}' is not a known mode; smart will be used",
                            ctx, mode
                        ));
                    }
                    policy.selection_mode = mode.to_string();
                }
                None => notes.push(type_note(&ctx, key, "a string", value)),
            },
            "required_coverage" => match as_u32(value).filter(|c| *c <= 100) {
                Some(v) => policy.required_coverage = v,
                None => notes.push(type_note(&ctx, key, "an integer 0-100", value)),
            },
            "allow_skipping" => match value.as_bool() {
                Some(v) => policy.allow_skipping = v,
                None => notes.push(type_note(&ctx, key, "a boolean", value)),
            },
            "max_execution_minutes" => match as_u32(value).filter(|m| *m > 0) {
                Some(v) => policy.max_execution_minutes = v,
                None => notes.push(type_note(&ctx, key, "a positive integer", value)),
            },
            "parallel_limit" => match as_u32(value).filter(|p| *p > 0) {
                Some(v) => policy.parallel_limit = v,
                None => notes.push(type_note(&ctx, key, "a positive integer", value)),
            },
            other => notes.push(format!("{}.{} is not a policy field; ignored", ctx, other)),
        }
    }
}

fn apply_entry_fields(name: &str, entry: &mut CatalogEntry, fields: &Table, notes: &mut Vec<String>) {
    let ctx = format!("categories.{}", name);
    for (key, value) in fields {
        match key.as_str() {
            "priority" => match as_u32(value) {
                Some(v) => entry.priority = v,
                None => notes.push(type_note(&ctx, key, "a non-negative integer", value)),
            },
            "duration_minutes" => match as_u32(value) {
                Some(v) => entry.duration_minutes = v,
                None => notes.push(type_note(&ctx, key, "a non-negative integer", value)),
            },
            "dependencies" => match value.as_array() {
                Some(items) => {
                    entry.dependencies = items
                        .iter()
                        .filter_map(|item| match item.as_str() {
                            Some(dep) => Some(dep.to_string()),
                            None => {
                                notes.push(format!(
                                    "{}.dependencies entry {} is not a string; ignored",
                                    ctx, item
                                ));
                                None
                            }
                        })
                        .collect();
                }
                None => notes.push(type_note(&ctx, key, "an array of strings", value)),
            },
            other => notes.push(format!("{}.{} is not a catalog field; ignored", ctx, other)),
        }
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_integer().and_then(|i| u32::try_from(i).ok())
}

fn type_note(ctx: &str, key: &str, expected: &str, found: &Value) -> String {
    format!(
        "{}.{} must be {}, found {}; keeping built-in value",
        ctx,
        key,
        expected,
        found.type_str()
    )
}
