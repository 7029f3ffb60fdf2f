//! secsync core
//!
//! Declarative reconciliation of cloud security group rules. A desired rule
//! set is compared against what the provider reports, and only the
//! difference is sent back: stale rules are deleted first, then missing
//! rules are created.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  secsync CLI                     │
//! │            (plan / sync / show)                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                   secsync                        │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          SecurityGroupSyncer              │   │
//! │  │   list → canonicalize → diff → apply      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Canonical   │  │    Egress    │            │
//! │  │    keys      │  │  invariant   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │ RuleLister / RuleMutator / GroupManager
//!           ┌───────▼───────┐
//!           │  secsync-vpc  │
//!           │  REST adapter │
//!           └───────────────┘
//! ```

pub mod canonical;
pub mod config;
pub mod diff;
pub mod egress;
pub mod error;
pub mod plan;
pub mod provider;
pub mod rule;
pub mod sync;

// Re-exports
pub use canonical::{CanonicalRule, PortRange, parse_cidr};
pub use config::SyncConfig;
pub use diff::{ExistingRule, PlannedRule, RuleDiff, diff, sort_rules};
pub use egress::{EgressInvariant, enforce_egress_invariant};
pub use error::{Result, SyncError, SyncPhase};
pub use plan::{ApplyResult, PlanSummary, SyncPlan};
pub use provider::{
    GroupManager, NewProviderRule, NewSecurityGroup, RuleLister, RuleMutator,
    SecurityGroupSnapshot,
};
pub use rule::{DesiredRule, Direction, Protocol, ProviderRule, RuleAction};
pub use sync::{SecurityGroupSyncer, SecurityGroupTarget, canonicalize_desired};
