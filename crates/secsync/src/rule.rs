//! Firewall rule model
//!
//! `DesiredRule` is what a caller asks for, `ProviderRule` is what the
//! remote API reports. Neither is compared directly; both go through
//! [`crate::canonical`] first.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Default priority for rules that do not specify one
pub const DEFAULT_PRIORITY: i32 = 1;

/// Provider IP version accepted by the reconciler
pub const IPV4: &str = "IPv4";

/// Traffic direction of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Ingress
    In,
    /// Egress
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a matching packet gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Deny,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IP protocol matched by a rule
///
/// Serializes as its lowercase name, including `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Every protocol
    Any,
    Tcp,
    Udp,
    Icmp,
    /// A provider-side protocol outside the supported set
    #[serde(skip_deserializing)]
    Other(String),
}

impl Protocol {
    /// Parse a protocol as reported by a provider.
    ///
    /// `ALL` is the provider's wildcard. Everything else is matched
    /// case-insensitively against the supported set.
    pub fn from_provider(value: &str) -> Self {
        if value == "ALL" {
            return Protocol::Any;
        }
        match value.to_ascii_lowercase().as_str() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "icmp" => Protocol::Icmp,
            "any" | "all" | "-1" => Protocol::Any,
            other => Protocol::Other(other.to_string()),
        }
    }

    /// Whether port numbers mean anything for this protocol
    pub fn has_ports(&self) -> bool {
        !matches!(self, Protocol::Any | Protocol::Icmp)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Any => "any",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Other(name) => name,
        }
    }
}

impl Serialize for Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule requested by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRule {
    pub direction: Direction,

    pub action: RuleAction,

    pub protocol: Protocol,

    /// First port of the range; `0` or `-1` with `port_end` means all ports
    #[serde(default)]
    pub port_start: i32,

    #[serde(default)]
    pub port_end: i32,

    /// Explicit port list, takes precedence over the range
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,

    /// CIDR in string form; empty means `0.0.0.0/0`
    #[serde(default)]
    pub cidr: String,

    /// Creation-time ordering hint, never part of rule identity
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl DesiredRule {
    pub fn new(
        direction: Direction,
        action: RuleAction,
        protocol: Protocol,
        cidr: impl Into<String>,
    ) -> Self {
        Self {
            direction,
            action,
            protocol,
            port_start: 0,
            port_end: 0,
            ports: Vec::new(),
            cidr: cidr.into(),
            priority: DEFAULT_PRIORITY,
        }
    }

    /// The catch-all egress rule every egress set must contain
    pub fn allow_all_egress(priority: i32) -> Self {
        Self::new(Direction::Out, RuleAction::Allow, Protocol::Any, "0.0.0.0/0")
            .with_priority(priority)
    }

    pub fn with_port_range(mut self, start: i32, end: i32) -> Self {
        self.port_start = start;
        self.port_end = end;
        self
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_egress(&self) -> bool {
        self.direction == Direction::Out
    }
}

/// Parses `<in|out>:<allow|deny> [cidr] <any|tcp|udp|icmp> [ports]`
///
/// Ports are `N`, `N-M` or `N,M,...`.
impl FromStr for DesiredRule {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| SyncError::InvalidRule(format!("{}: '{}'", reason, s));

        let mut tokens = s.split_whitespace();
        let head = tokens.next().ok_or_else(|| invalid("empty rule"))?;
        let (direction, action) = head
            .split_once(':')
            .ok_or_else(|| invalid("expected <direction>:<action>"))?;

        let direction = match direction {
            "in" => Direction::In,
            "out" => Direction::Out,
            _ => return Err(invalid("direction must be 'in' or 'out'")),
        };
        let action = match action {
            "allow" => RuleAction::Allow,
            "deny" => RuleAction::Deny,
            _ => return Err(invalid("action must be 'allow' or 'deny'")),
        };

        let mut cidr = String::new();
        let mut protocol = None;
        for token in tokens.by_ref() {
            match parse_protocol_keyword(token) {
                Some(p) => {
                    protocol = Some(p);
                    break;
                }
                None if cidr.is_empty() => {
                    crate::canonical::parse_cidr(token)?;
                    cidr = token.to_string();
                }
                None => return Err(invalid("unexpected token before protocol")),
            }
        }
        let protocol = protocol.ok_or_else(|| invalid("missing protocol"))?;

        let mut rule = DesiredRule::new(direction, action, protocol, cidr);
        if let Some(ports) = tokens.next() {
            if !rule.protocol.has_ports() {
                return Err(invalid("ports are only valid for tcp and udp"));
            }
            rule = apply_ports(rule, ports).ok_or_else(|| invalid("bad port specification"))?;
        }
        if tokens.next().is_some() {
            return Err(invalid("trailing tokens"));
        }

        Ok(rule)
    }
}

fn parse_protocol_keyword(token: &str) -> Option<Protocol> {
    match token {
        "any" => Some(Protocol::Any),
        "tcp" => Some(Protocol::Tcp),
        "udp" => Some(Protocol::Udp),
        "icmp" => Some(Protocol::Icmp),
        _ => None,
    }
}

fn apply_ports(rule: DesiredRule, spec: &str) -> Option<DesiredRule> {
    if spec.contains(',') {
        let ports = spec
            .split(',')
            .map(|p| p.parse::<u16>().ok().filter(|p| *p > 0))
            .collect::<Option<Vec<_>>>()?;
        return Some(rule.with_ports(ports));
    }

    let (start, end) = match spec.split_once('-') {
        Some((start, end)) => (start.parse::<u16>().ok()?, end.parse::<u16>().ok()?),
        None => {
            let port = spec.parse::<u16>().ok()?;
            (port, port)
        }
    };
    if start == 0 || start > end {
        return None;
    }
    Some(rule.with_port_range(start.into(), end.into()))
}

impl fmt::Display for DesiredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.direction, self.action)?;
        if !self.cidr.is_empty() {
            write!(f, " {}", self.cidr)?;
        }
        write!(f, " {}", self.protocol)?;
        if !self.ports.is_empty() {
            let ports: Vec<String> = self.ports.iter().map(|p| p.to_string()).collect();
            write!(f, " {}", ports.join(","))?;
        } else if self.port_start > 0 && self.port_end > 0 {
            if self.port_start == self.port_end {
                write!(f, " {}", self.port_start)?;
            } else {
                write!(f, " {}-{}", self.port_start, self.port_end)?;
            }
        }
        Ok(())
    }
}

/// A rule as the provider reports it
///
/// Field names follow the provider's wire format. Nothing here is ever
/// modified locally; stale rules are deleted by id and recreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderRule {
    pub id: String,

    #[serde(default)]
    pub group_id: String,

    /// `Ingress` or `Egress`
    pub direction: String,

    /// `Allow`/`Accept` or `Deny`/`Drop`; absent on allow-only providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,

    /// `TCP`, `UDP`, `ICMP` or `ALL`
    pub protocol: String,

    #[serde(default = "unset_port")]
    pub start_port: i32,

    #[serde(default = "unset_port")]
    pub end_port: i32,

    #[serde(rename = "AllowedCIDR", default)]
    pub allowed_cidr: String,

    /// Another security group this rule refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group_ref: Option<String>,

    #[serde(rename = "IPVersion", default = "default_ip_version")]
    pub ip_version: String,

    #[serde(default)]
    pub state: String,
}

fn unset_port() -> i32 {
    -1
}

fn default_ip_version() -> String {
    IPV4.to_string()
}

impl ProviderRule {
    /// Whether the rule points at another security group
    pub fn has_remote_group(&self) -> bool {
        self.remote_group_ref
            .as_deref()
            .is_some_and(|group| !group.is_empty())
    }

    pub fn is_ip_version(&self, version: &str) -> bool {
        self.ip_version.eq_ignore_ascii_case(version)
    }

    /// Whether the provider is already removing this rule
    pub fn is_deleting(&self) -> bool {
        self.state.eq_ignore_ascii_case("deleting")
    }
}
