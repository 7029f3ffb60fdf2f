//! Egress fallback invariant
//!
//! Providers reject rule sets that leave egress without a catch-all, and
//! reject a second catch-all as a duplicate. Any desired set that touches
//! egress therefore carries exactly one `out:allow any 0.0.0.0/0`.

use crate::canonical::CanonicalRule;
use crate::rule::{DEFAULT_PRIORITY, DesiredRule};

/// Adds the allow-all egress rule to desired sets that need it
#[derive(Debug, Clone, Copy)]
pub struct EgressInvariant {
    fallback_priority: i32,
}

impl Default for EgressInvariant {
    fn default() -> Self {
        Self::new(DEFAULT_PRIORITY)
    }
}

impl EgressInvariant {
    pub fn new(fallback_priority: i32) -> Self {
        Self { fallback_priority }
    }

    /// Append the fallback if `rules` has egress rules but no catch-all.
    ///
    /// The presence check compares canonical forms, so running this twice
    /// never adds a second fallback. Rules that fail to canonicalize are
    /// skipped here and rejected later by the caller's canonicalize step.
    pub fn enforce(&self, mut rules: Vec<DesiredRule>) -> Vec<DesiredRule> {
        if !rules.iter().any(DesiredRule::is_egress) {
            return rules;
        }

        let has_fallback = rules.iter().filter(|rule| rule.is_egress()).any(|rule| {
            CanonicalRule::from_desired(rule)
                .map(|canonical| canonical.iter().any(CanonicalRule::is_allow_all_egress))
                .unwrap_or(false)
        });

        if !has_fallback {
            tracing::debug!("Adding allow-all egress fallback rule");
            rules.push(DesiredRule::allow_all_egress(self.fallback_priority));
        }
        rules
    }
}

/// [`EgressInvariant::enforce`] with the default fallback priority
pub fn enforce_egress_invariant(rules: Vec<DesiredRule>) -> Vec<DesiredRule> {
    EgressInvariant::default().enforce(rules)
}
