//! Sync plans and apply results

use crate::diff::{ExistingRule, PlannedRule, RuleDiff};
use serde::Serialize;
use std::fmt;

/// What a sync pass is going to do to one security group
#[derive(Debug, Clone, Serialize)]
pub struct SyncPlan {
    pub group_id: String,

    /// Current rules that stay as they are
    pub unchanged: Vec<ExistingRule>,

    /// Rules to create, in key order
    pub to_add: Vec<PlannedRule>,

    /// Rules to delete, in key order
    pub to_remove: Vec<ExistingRule>,
}

impl SyncPlan {
    pub fn new(group_id: impl Into<String>, diff: RuleDiff) -> Self {
        Self {
            group_id: group_id.into(),
            unchanged: diff.unchanged,
            to_add: diff.to_add,
            to_remove: diff.to_remove,
        }
    }

    /// Whether applying the plan would touch the provider at all
    pub fn has_changes(&self) -> bool {
        !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    /// Ids of the rules that will be deleted
    pub fn removal_ids(&self) -> Vec<String> {
        self.to_remove.iter().map(|rule| rule.id.clone()).collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            add: self.to_add.len(),
            remove: self.to_remove.len(),
            unchanged: self.unchanged.len(),
        }
    }
}

/// Counts of planned changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub add: usize,
    pub remove: usize,
    pub unchanged: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to remove, {} unchanged",
            self.add, self.remove, self.unchanged
        )
    }
}

/// Result of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub group_id: String,

    /// Number of rules deleted
    pub deleted: usize,

    /// Number of rule entries created
    pub created: usize,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..Self::default()
        }
    }

    /// Whether nothing was sent to the provider
    pub fn is_noop(&self) -> bool {
        self.deleted == 0 && self.created == 0
    }
}

impl fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} deleted, {} created ({} ms)",
            self.group_id, self.deleted, self.created, self.duration_ms
        )
    }
}
