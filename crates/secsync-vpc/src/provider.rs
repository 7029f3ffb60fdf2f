//! secsync provider traits for the VPC API

use crate::client::VpcClient;
use crate::config::VpcConfig;
use async_trait::async_trait;
use secsync::{
    GroupManager, NewProviderRule, NewSecurityGroup, ProviderRule, RuleLister, RuleMutator,
    SecurityGroupSnapshot,
};

/// VPC API provider
pub struct VpcProvider {
    client: VpcClient,
}

impl VpcProvider {
    pub fn new(client: VpcClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: VpcConfig) -> crate::Result<Self> {
        Ok(Self::new(VpcClient::new(config)?))
    }

    pub fn client(&self) -> &VpcClient {
        &self.client
    }
}

#[async_trait]
impl RuleLister for VpcProvider {
    async fn list_rules(&self, group_id: &str) -> secsync::Result<Vec<ProviderRule>> {
        let rules = self.client.list_rules(group_id).await?;
        tracing::debug!("Listed {} rules in security group {}", rules.len(), group_id);
        Ok(rules)
    }
}

#[async_trait]
impl RuleMutator for VpcProvider {
    async fn create_rules(
        &self,
        group_id: &str,
        rules: &[NewProviderRule],
    ) -> secsync::Result<()> {
        Ok(self.client.create_rules(group_id, rules).await?)
    }

    async fn delete_rules(&self, rule_ids: &[String]) -> secsync::Result<()> {
        Ok(self.client.delete_rules(rule_ids).await?)
    }
}

#[async_trait]
impl GroupManager for VpcProvider {
    async fn get_security_group(
        &self,
        group_id: &str,
    ) -> secsync::Result<Option<SecurityGroupSnapshot>> {
        Ok(self.client.get_security_group(group_id).await?)
    }

    async fn create_security_group(
        &self,
        group: &NewSecurityGroup,
    ) -> secsync::Result<SecurityGroupSnapshot> {
        Ok(self.client.create_security_group(group).await?)
    }
}
