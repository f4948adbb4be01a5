//! Per-branch planning policy.
//!
//! A branch name is matched against an ordered list of named policies
//! (`main`, `develop`, `release/*`, `hotfix/*`, `feature/*`); the first match
//! wins and anything unmatched gets the `feature` policy.

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// Name of the policy used when no pattern matches.
pub const DEFAULT_POLICY: &str = "feature";

/// How a branch is planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPolicy {
    pub name: String,
    pub pattern: String,
    /// Raw mode name; unrecognised values are resolved to `smart` at planning time.
    pub selection_mode: String,
    /// Required coverage, in percent.
    pub required_coverage: u32,
    pub allow_skipping: bool,
    pub max_execution_minutes: u32,
    pub parallel_limit: u32,
}

impl BranchPolicy {
    #[allow(clippy::too_many_arguments)]
    fn builtin(
        name: &str,
        pattern: &str,
        selection_mode: &str,
        required_coverage: u32,
        allow_skipping: bool,
        max_execution_minutes: u32,
        parallel_limit: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            selection_mode: selection_mode.to_string(),
            required_coverage,
            allow_skipping,
            max_execution_minutes,
            parallel_limit,
        }
    }

    /// The built-in policies in match order.
    pub fn builtin_set() -> Vec<BranchPolicy> {
        vec![
            Self::builtin("main", "main", "comprehensive", 90, false, 90, 8),
            Self::builtin("develop", "develop", "smart", 80, true, 60, 6),
            Self::builtin("release", "release/*", "comprehensive", 95, false, 120, 8),
            Self::builtin("hotfix", "hotfix/*", "targeted", 95, false, 30, 10),
            Self::builtin("feature", "feature/*", "smart", 70, true, 45, 4),
        ]
    }
}

/// Ordered, compiled branch policies.
#[derive(Debug, Clone)]
pub struct BranchPolicies {
    policies: Vec<BranchPolicy>,
    matchers: Vec<GlobMatcher>,
    /// Index of the [`DEFAULT_POLICY`] entry; `new` guarantees one exists.
    default_idx: usize,
}

impl BranchPolicies {
    /// Compile `policies` in match order. The list must contain a policy
    /// named [`DEFAULT_POLICY`], or [`BranchPolicy::builtin_set`]'s is appended.
    pub fn new(mut policies: Vec<BranchPolicy>) -> PlanResult<Self> {
        let default_idx = match policies.iter().position(|p| p.name == DEFAULT_POLICY) {
            Some(idx) => idx,
            None => {
                policies.extend(
                    BranchPolicy::builtin_set()
                        .into_iter()
                        .filter(|p| p.name == DEFAULT_POLICY),
                );
                policies.len() - 1
            }
        };
        let matchers = policies
            .iter()
            .map(|p| {
                GlobBuilder::new(&p.pattern)
                    .literal_separator(false)
                    .build()
                    .map(|g| g.compile_matcher())
                    .map_err(|e| PlanError::InvalidPattern {
                        pattern: p.pattern.clone(),
                        reason: e.kind().to_string(),
                    })
            })
            .collect::<PlanResult<Vec<_>>>()?;
        Ok(Self {
            policies,
            matchers,
            default_idx,
        })
    }

    pub fn builtin() -> PlanResult<Self> {
        Self::new(BranchPolicy::builtin_set())
    }

    pub fn policies(&self) -> &[BranchPolicy] {
        &self.policies
    }

    pub fn get(&self, name: &str) -> Option<&BranchPolicy> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BranchPolicy> {
        self.policies.iter_mut().find(|p| p.name == name)
    }

    /// The policy unmatched branches fall back to.
    pub fn default_policy(&self) -> &BranchPolicy {
        &self.policies[self.default_idx]
    }

    /// Policy for `branch`: first pattern match, else [`DEFAULT_POLICY`].
    pub fn resolve(&self, branch: &str) -> &BranchPolicy {
        let branch = branch.trim();
        let branch = branch.strip_prefix("refs/heads/").unwrap_or(branch);
        self.policies
            .iter()
            .zip(&self.matchers)
            .find(|(_, m)| m.is_match(branch))
            .map(|(p, _)| p)
            .unwrap_or_else(|| self.default_policy())
    }
}
