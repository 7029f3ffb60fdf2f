use async_trait::async_trait;
use secsync::{
    CanonicalRule, DesiredRule, GroupManager, NewProviderRule, NewSecurityGroup, ProviderRule,
    Result, RuleLister, RuleMutator, SecurityGroupSnapshot, SyncError,
};
use std::sync::Mutex;

/// A provider call, as seen by [`MemoryProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(String),
    Create(String, usize),
    Delete(Vec<String>),
    GetGroup(String),
    CreateGroup(String),
}

/// Provider operations that can be made to fail
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    List,
    Create,
    Delete,
    GetGroup,
}

#[derive(Default)]
struct State {
    groups: Vec<SecurityGroupSnapshot>,
    rules: Vec<ProviderRule>,
    next_id: usize,
    calls: Vec<Call>,
    failures: Vec<Failure>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check(&self, failure: Failure) -> Result<()> {
        if self.failures.contains(&failure) {
            return Err(SyncError::ApiError(format!("injected {:?} failure", failure)));
        }
        Ok(())
    }
}

/// In-memory provider that applies creates and deletes to its own state
#[derive(Default)]
pub struct MemoryProvider {
    state: Mutex<State>,
}

#[allow(dead_code)]
impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, id: &str) -> Self {
        self.state.lock().unwrap().groups.push(SecurityGroupSnapshot {
            id: id.to_string(),
            name: id.to_string(),
            vpc_id: "vpc-test".to_string(),
            description: String::new(),
        });
        self
    }

    /// Seed `group_id` with rules written in the text syntax
    pub fn with_rules(self, group_id: &str, rules: &[&str]) -> Self {
        for text in rules {
            let desired: DesiredRule = text.parse().unwrap();
            for canonical in CanonicalRule::from_desired(&desired).unwrap() {
                let schema = NewProviderRule::from_canonical(&canonical, desired.priority);
                self.insert(group_id, &schema);
            }
        }
        self
    }

    /// Seed a raw provider rule
    pub fn with_raw_rule(self, rule: ProviderRule) -> Self {
        self.state.lock().unwrap().rules.push(rule);
        self
    }

    pub fn failing(self, failure: Failure) -> Self {
        self.state.lock().unwrap().failures.push(failure);
        self
    }

    pub fn rules(&self, group_id: &str) -> Vec<ProviderRule> {
        self.state
            .lock()
            .unwrap()
            .rules
            .iter()
            .filter(|rule| rule.group_id == group_id)
            .cloned()
            .collect()
    }

    pub fn groups(&self) -> Vec<SecurityGroupSnapshot> {
        self.state.lock().unwrap().groups.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of create and delete calls made so far
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Create(..) | Call::Delete(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn insert(&self, group_id: &str, schema: &NewProviderRule) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("rule");
        state.rules.push(ProviderRule {
            id: id.clone(),
            group_id: group_id.to_string(),
            direction: schema.direction.clone(),
            policy: Some(schema.policy.clone()),
            protocol: schema.protocol.clone(),
            start_port: schema.start_port,
            end_port: schema.end_port,
            allowed_cidr: schema.allowed_cidr.clone(),
            remote_group_ref: None,
            ip_version: schema.ip_version.clone(),
            state: "active".to_string(),
        });
        id
    }
}

#[async_trait]
impl RuleLister for MemoryProvider {
    async fn list_rules(&self, group_id: &str) -> Result<Vec<ProviderRule>> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::List(group_id.to_string()));
            state.check(Failure::List)?;
        }
        Ok(self.rules(group_id))
    }
}

#[async_trait]
impl RuleMutator for MemoryProvider {
    async fn create_rules(&self, group_id: &str, rules: &[NewProviderRule]) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Create(group_id.to_string(), rules.len()));
            state.check(Failure::Create)?;
        }
        for rule in rules {
            self.insert(group_id, rule);
        }
        Ok(())
    }

    async fn delete_rules(&self, rule_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(rule_ids.to_vec()));
        state.check(Failure::Delete)?;
        state.rules.retain(|rule| !rule_ids.contains(&rule.id));
        Ok(())
    }
}

#[async_trait]
impl GroupManager for MemoryProvider {
    async fn get_security_group(&self, group_id: &str) -> Result<Option<SecurityGroupSnapshot>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetGroup(group_id.to_string()));
        state.check(Failure::GetGroup)?;
        Ok(state.groups.iter().find(|group| group.id == group_id).cloned())
    }

    async fn create_security_group(
        &self,
        group: &NewSecurityGroup,
    ) -> Result<SecurityGroupSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateGroup(group.name.clone()));
        let snapshot = SecurityGroupSnapshot {
            id: state.next_id("sg"),
            name: group.name.clone(),
            vpc_id: group.vpc_id.clone(),
            description: group.description.clone(),
        };
        state.groups.push(snapshot.clone());
        Ok(snapshot)
    }
}
