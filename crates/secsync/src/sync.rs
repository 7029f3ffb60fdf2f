//! Security group rule sync
//!
//! One sync pass is fetch, diff, delete, add, strictly in that order, with
//! no state carried between passes. Nothing here locks the remote group:
//! callers must not run two passes against the same group at once.

use crate::canonical::CanonicalRule;
use crate::config::SyncConfig;
use crate::diff::{ExistingRule, PlannedRule, diff, sort_rules};
use crate::egress::EgressInvariant;
use crate::error::{Result, SyncError, SyncPhase};
use crate::plan::{ApplyResult, SyncPlan};
use crate::provider::{GroupManager, NewProviderRule, NewSecurityGroup, RuleLister, RuleMutator};
use crate::rule::{DesiredRule, ProviderRule};
use std::time::Duration;

/// The group a sync is aimed at, and how to create it if it is missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityGroupTarget {
    /// Existing group id, if known
    pub id: Option<String>,

    pub vpc_id: String,

    pub name: String,

    pub description: String,
}

impl SecurityGroupTarget {
    pub fn existing(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Creation request for this target.
    ///
    /// Providers reserve the name `default`, so it is prefixed with the VPC id.
    pub fn creation_request(&self) -> NewSecurityGroup {
        let name = if self.name.eq_ignore_ascii_case("default") {
            format!("{}-{}", self.vpc_id, self.name)
        } else {
            self.name.clone()
        };

        NewSecurityGroup {
            name,
            vpc_id: self.vpc_id.clone(),
            description: self.description.clone(),
        }
    }
}

/// Reconciles security group rules through a provider adapter
pub struct SecurityGroupSyncer<P> {
    provider: P,
    config: SyncConfig,
}

impl<P> SecurityGroupSyncer<P> {
    pub fn new(provider: P, config: SyncConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn is_reconciled(&self, rule: &ProviderRule) -> bool {
        if !rule.is_ip_version(&self.config.ip_version) {
            tracing::warn!("Skipping {} rule {}", rule.ip_version, rule.id);
            return false;
        }
        if rule.is_deleting() {
            tracing::warn!("Skipping rule {}, already being deleted", rule.id);
            return false;
        }
        true
    }
}

impl<P: RuleLister> SecurityGroupSyncer<P> {
    /// Fetch, canonicalize and sort the rules currently in `group_id`
    pub async fn current_rules(&self, group_id: &str) -> Result<Vec<ExistingRule>> {
        let rules = self
            .provider
            .list_rules(group_id)
            .await
            .map_err(|e| SyncError::in_phase(SyncPhase::List, group_id, e))?;

        let existing = rules
            .iter()
            .filter(|rule| self.is_reconciled(rule))
            .map(ExistingRule::from_provider)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| SyncError::in_phase(SyncPhase::Diff, group_id, e))?;

        tracing::debug!(
            "Fetched {} rules for security group {} ({} reconciled)",
            rules.len(),
            group_id,
            existing.len()
        );
        Ok(sort_rules(existing))
    }

    /// Compute what a sync of `group_id` towards `desired` would do
    pub async fn plan(&self, group_id: &str, desired: &[DesiredRule]) -> Result<SyncPlan> {
        let current = self.current_rules(group_id).await?;

        let invariant = EgressInvariant::new(self.config.egress_fallback_priority);
        let desired = canonicalize_desired(desired, &invariant)
            .map_err(|e| SyncError::in_phase(SyncPhase::Diff, group_id, e))?;

        let plan = SyncPlan::new(group_id, diff(desired, current));
        tracing::info!("Security group {}: {}", group_id, plan.summary());
        Ok(plan)
    }
}

impl<P: RuleMutator> SecurityGroupSyncer<P> {
    /// Apply a plan: one batched delete, then one batched create.
    ///
    /// A failed delete stops the pass before anything is created, so a
    /// rule is never added next to an old copy that could not be removed.
    pub async fn apply(&self, plan: &SyncPlan) -> Result<ApplyResult> {
        let start = std::time::Instant::now();
        let mut result = ApplyResult::new(&plan.group_id);

        if !plan.to_remove.is_empty() {
            let ids = plan.removal_ids();
            tracing::info!(
                "Deleting {} rules from security group {}",
                ids.len(),
                plan.group_id
            );
            self.provider
                .delete_rules(&ids)
                .await
                .map_err(|e| SyncError::in_phase(SyncPhase::Delete, &plan.group_id, e))?;
            result.deleted = ids.len();
        }

        if !plan.to_add.is_empty() {
            let rules: Vec<NewProviderRule> = plan
                .to_add
                .iter()
                .map(|planned| NewProviderRule::from_canonical(&planned.rule, planned.priority))
                .collect();
            tracing::info!(
                "Creating {} rules in security group {}",
                rules.len(),
                plan.group_id
            );
            self.provider
                .create_rules(&plan.group_id, &rules)
                .await
                .map_err(|e| SyncError::in_phase(SyncPhase::Add, &plan.group_id, e))?;
            result.created = rules.len();
        }

        result.duration_ms = millis(start.elapsed());
        Ok(result)
    }
}

impl<P: RuleLister + RuleMutator> SecurityGroupSyncer<P> {
    /// Bring the rules of `group_id` in line with `desired`
    pub async fn sync(&self, group_id: &str, desired: &[DesiredRule]) -> Result<ApplyResult> {
        let plan = self.plan(group_id, desired).await?;
        if !plan.has_changes() {
            tracing::debug!("Security group {} is up to date", group_id);
        }
        self.apply(&plan).await
    }
}

impl<P: RuleLister + RuleMutator + GroupManager> SecurityGroupSyncer<P> {
    /// Find the target group, or create it when it does not exist
    pub async fn resolve_group(&self, target: &SecurityGroupTarget) -> Result<String> {
        if let Some(id) = target.id.as_deref().filter(|id| !id.is_empty()) {
            match self.provider.get_security_group(id).await {
                Ok(Some(group)) => return Ok(group.id),
                Ok(None) | Err(SyncError::GroupNotFound(_)) => {
                    tracing::warn!("Security group {} not found, creating a new one", id);
                }
                Err(e) => return Err(SyncError::in_phase(SyncPhase::Lookup, id, e)),
            }
        }

        let request = target.creation_request();
        let group = self
            .provider
            .create_security_group(&request)
            .await
            .map_err(|e| SyncError::in_phase(SyncPhase::Lookup, &request.name, e))?;
        tracing::info!("Created security group {} ({})", group.name, group.id);
        Ok(group.id)
    }

    /// Resolve (or create) the target group, then sync its rules
    pub async fn sync_security_group(
        &self,
        target: &SecurityGroupTarget,
        desired: &[DesiredRule],
    ) -> Result<ApplyResult> {
        let group_id = self.resolve_group(target).await?;
        self.sync(&group_id, desired).await
    }
}

/// Canonicalize and sort the desired side of a sync.
///
/// The egress invariant is applied to the egress subset only. The result is
/// deduplicated by canonical key; the first occurrence wins.
pub fn canonicalize_desired(
    desired: &[DesiredRule],
    invariant: &EgressInvariant,
) -> Result<Vec<PlannedRule>> {
    let (egress, ingress): (Vec<DesiredRule>, Vec<DesiredRule>) =
        desired.iter().cloned().partition(DesiredRule::is_egress);
    let egress = invariant.enforce(egress);

    let mut planned = Vec::with_capacity(ingress.len() + egress.len());
    for rule in ingress.iter().chain(egress.iter()) {
        planned.extend(
            CanonicalRule::from_desired(rule)?
                .into_iter()
                .map(|canonical| PlannedRule {
                    rule: canonical,
                    priority: rule.priority,
                }),
        );
    }

    let mut planned = sort_rules(planned);
    let before = planned.len();
    planned.dedup_by(|later, earlier| later.rule.key() == earlier.rule.key());
    if planned.len() < before {
        tracing::debug!("Dropped {} duplicate desired rules", before - planned.len());
    }
    Ok(planned)
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
