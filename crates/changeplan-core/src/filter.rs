//! Selection-mode filtering of a grouped plan.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::grouping::ExecutionGroup;

/// Floor applied in [`SelectionMode::Minimal`].
pub const MINIMAL_FLOOR: u32 = 90;
/// Floor applied in [`SelectionMode::Targeted`].
pub const TARGETED_FLOOR: u32 = 70;
/// Floor applied in [`SelectionMode::Smart`] when the branch allows skipping.
pub const SMART_FLOOR: u32 = 50;

/// How aggressively low-priority tests are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Full,
    Comprehensive,
    Minimal,
    Targeted,
    Smart,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Full => "full",
            SelectionMode::Comprehensive => "comprehensive",
            SelectionMode::Minimal => "minimal",
            SelectionMode::Targeted => "targeted",
            SelectionMode::Smart => "smart",
        }
    }

    /// Parse `s`, falling back to [`SelectionMode::Smart`] for anything
    /// unrecognised. The flag is `false` when the fallback was taken.
    pub fn parse_lenient(s: &str) -> (SelectionMode, bool) {
        match s.parse() {
            Ok(mode) => (mode, true),
            Err(_) => (SelectionMode::Smart, false),
        }
    }

    /// Minimum adjusted priority a test needs to survive, if any.
    pub fn priority_floor(&self, allow_skipping: bool) -> Option<u32> {
        match self {
            SelectionMode::Full | SelectionMode::Comprehensive => None,
            SelectionMode::Minimal => Some(MINIMAL_FLOOR),
            SelectionMode::Targeted => Some(TARGETED_FLOOR),
            SelectionMode::Smart => allow_skipping.then_some(SMART_FLOOR),
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(SelectionMode::Full),
            "comprehensive" => Ok(SelectionMode::Comprehensive),
            "minimal" => Ok(SelectionMode::Minimal),
            "targeted" => Ok(SelectionMode::Targeted),
            "smart" => Ok(SelectionMode::Smart),
            other => Err(format!("unknown selection mode: {}", other)),
        }
    }
}

/// Drop tests below `floor`. Emptied groups are dropped; order is kept.
pub fn apply_floor(groups: &[ExecutionGroup], floor: Option<u32>) -> Vec<ExecutionGroup> {
    match floor {
        None => groups.to_vec(),
        Some(floor) => groups
            .iter()
            .filter_map(|g| g.retain(|t| t.priority >= floor))
            .collect(),
    }
}

/// Filter `groups` for `mode` under the branch's skipping policy.
pub fn filter_groups(
    groups: &[ExecutionGroup],
    mode: SelectionMode,
    allow_skipping: bool,
) -> Vec<ExecutionGroup> {
    apply_floor(groups, mode.priority_floor(allow_skipping))
}
