//! Provider capability traits
//!
//! A provider adapter implements [`RuleLister`] and [`RuleMutator`] for
//! plain rule sync, plus [`GroupManager`] if it can also look up and create
//! security groups. Adapters own transport concerns (auth, retries,
//! timeouts); the traits only describe what is asked of them.

use crate::canonical::CanonicalRule;
use crate::error::Result;
use crate::rule::{Direction, IPV4, Protocol, ProviderRule, RuleAction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reads the current rules of a security group
#[async_trait]
pub trait RuleLister: Send + Sync {
    async fn list_rules(&self, group_id: &str) -> Result<Vec<ProviderRule>>;
}

/// Creates and deletes rules
#[async_trait]
pub trait RuleMutator: Send + Sync {
    /// Create all `rules` in `group_id` in one batch
    async fn create_rules(&self, group_id: &str, rules: &[NewProviderRule]) -> Result<()>;

    /// Delete the rules with the given ids in one batch
    async fn delete_rules(&self, rule_ids: &[String]) -> Result<()>;
}

/// Looks up and creates security groups
#[async_trait]
pub trait GroupManager: Send + Sync {
    /// Returns `None` if the group does not exist
    async fn get_security_group(&self, group_id: &str) -> Result<Option<SecurityGroupSnapshot>>;

    async fn create_security_group(
        &self,
        group: &NewSecurityGroup,
    ) -> Result<SecurityGroupSnapshot>;
}

/// A security group as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupSnapshot {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub vpc_id: String,

    #[serde(default)]
    pub description: String,
}

/// Request body for creating a security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewSecurityGroup {
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub vpc_id: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// A rule in the provider's creation schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewProviderRule {
    /// `Ingress` or `Egress`
    pub direction: String,

    /// `Allow` or `Deny`
    pub policy: String,

    /// Upper-cased protocol, `ALL` for any
    pub protocol: String,

    pub start_port: i32,

    pub end_port: i32,

    #[serde(rename = "AllowedCIDR")]
    pub allowed_cidr: String,

    #[serde(rename = "IPVersion")]
    pub ip_version: String,

    pub priority: i32,
}

impl NewProviderRule {
    /// Convert a canonical rule into the creation schema.
    ///
    /// Protocols without ports get `-1/-1`. A TCP or UDP rule without a
    /// port range is widened to `0-65535`.
    pub fn from_canonical(rule: &CanonicalRule, priority: i32) -> Self {
        let (start_port, end_port) = if !rule.protocol().has_ports() {
            (-1, -1)
        } else {
            match rule.ports() {
                Some(range) => (i32::from(range.start), i32::from(range.end)),
                None => (0, crate::canonical::MAX_PORT),
            }
        };

        Self {
            direction: match rule.direction() {
                Direction::In => "Ingress".to_string(),
                Direction::Out => "Egress".to_string(),
            },
            policy: match rule.action() {
                RuleAction::Allow => "Allow".to_string(),
                RuleAction::Deny => "Deny".to_string(),
            },
            protocol: match rule.protocol() {
                Protocol::Any => "ALL".to_string(),
                other => other.as_str().to_ascii_uppercase(),
            },
            start_port,
            end_port,
            allowed_cidr: rule.cidr().to_string(),
            ip_version: IPV4.to_string(),
            priority,
        }
    }
}
