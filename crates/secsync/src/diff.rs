//! Sorting and diffing of canonical rule sets

use crate::canonical::CanonicalRule;
use crate::error::Result;
use crate::rule::ProviderRule;
use serde::Serialize;
use std::cmp::Ordering;

/// A desired rule after canonicalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedRule {
    pub rule: CanonicalRule,

    /// Priority to create the rule with
    pub priority: i32,
}

impl AsRef<CanonicalRule> for PlannedRule {
    fn as_ref(&self) -> &CanonicalRule {
        &self.rule
    }
}

/// A rule that currently exists on the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingRule {
    /// Provider-assigned rule id, used for deletion
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_group_ref: Option<String>,

    pub rule: CanonicalRule,
}

impl ExistingRule {
    pub fn from_provider(rule: &ProviderRule) -> Result<Self> {
        Ok(Self {
            id: rule.id.clone(),
            remote_group_ref: rule
                .remote_group_ref
                .clone()
                .filter(|group| !group.is_empty()),
            rule: CanonicalRule::from_provider(rule)?,
        })
    }

    pub fn has_remote_group(&self) -> bool {
        self.remote_group_ref.is_some()
    }
}

impl AsRef<CanonicalRule> for ExistingRule {
    fn as_ref(&self) -> &CanonicalRule {
        &self.rule
    }
}

/// Sort rules by canonical key and return them.
///
/// The sort is stable, so among equal keys the input order is kept.
pub fn sort_rules<T: AsRef<CanonicalRule>>(mut rules: Vec<T>) -> Vec<T> {
    rules.sort_by(|a, b| a.as_ref().key().cmp(b.as_ref().key()));
    rules
}

/// Outcome of comparing a desired set against the current set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleDiff {
    /// Current rules that already match a desired rule
    pub unchanged: Vec<ExistingRule>,

    pub to_add: Vec<PlannedRule>,

    pub to_remove: Vec<ExistingRule>,
}

/// Merge two key-sorted sequences into unchanged / add / remove.
///
/// Both inputs must be sorted with [`sort_rules`]. A current rule that
/// refers to another security group is never left unchanged: it is removed
/// and its desired twin is added again.
pub fn diff(desired: Vec<PlannedRule>, current: Vec<ExistingRule>) -> RuleDiff {
    let mut result = RuleDiff::default();
    let mut desired = desired.into_iter().peekable();
    let mut current = current.into_iter().peekable();

    loop {
        let order = match (desired.peek(), current.peek()) {
            (Some(d), Some(c)) => c.rule.key().cmp(d.rule.key()),
            // Only desired left: everything is added
            (Some(_), None) => Ordering::Greater,
            // Only current left: everything is removed
            (None, Some(_)) => Ordering::Less,
            (None, None) => break,
        };

        match order {
            Ordering::Equal => {
                if let (Some(d), Some(c)) = (desired.next(), current.next()) {
                    if c.has_remote_group() {
                        result.to_remove.push(c);
                        result.to_add.push(d);
                    } else {
                        result.unchanged.push(c);
                    }
                }
            }
            Ordering::Less => result.to_remove.extend(current.next()),
            Ordering::Greater => result.to_add.extend(desired.next()),
        }
    }

    result
}
