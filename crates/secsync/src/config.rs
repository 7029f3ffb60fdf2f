//! Reconciler configuration

use crate::rule::{DEFAULT_PRIORITY, IPV4};
use serde::{Deserialize, Serialize};

/// Settings for [`crate::SecurityGroupSyncer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Priority given to the injected allow-all egress rule
    pub egress_fallback_priority: i32,

    /// Only provider rules of this IP version are reconciled
    pub ip_version: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            egress_fallback_priority: DEFAULT_PRIORITY,
            ip_version: IPV4.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn with_egress_fallback_priority(mut self, priority: i32) -> Self {
        self.egress_fallback_priority = priority;
        self
    }
}
