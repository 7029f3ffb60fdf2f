//! Canonical rule form
//!
//! Both desired and provider rules are reduced to a [`CanonicalRule`] whose
//! string key drives equality and ordering. The key is built from direction,
//! action, protocol, port range and CIDR, in that order, joined by `|`.
//! Priority, ids and group references are deliberately left out.

use crate::error::{Result, SyncError};
use crate::rule::{DesiredRule, Direction, Protocol, ProviderRule, RuleAction};
use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

/// The CIDR that matches every IPv4 address
pub const ANY_CIDR: &str = "0.0.0.0/0";

/// Highest valid port number
pub const MAX_PORT: i32 = 65535;

const SEPARATOR: char = '|';

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Comparison-ready form of a firewall rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CanonicalRule {
    direction: Direction,
    action: RuleAction,
    protocol: Protocol,
    /// `None` means every port
    ports: Option<PortRange>,
    cidr: Ipv4Network,
    key: String,
}

impl CanonicalRule {
    pub fn new(
        direction: Direction,
        action: RuleAction,
        protocol: Protocol,
        ports: Option<PortRange>,
        cidr: Ipv4Network,
    ) -> Self {
        let ports = ports.filter(|range| protocol.has_ports() && !covers_all_ports(range));
        let key = format!(
            "{dir}{sep}{action}{sep}{proto}{sep}{ports}{sep}{cidr}",
            dir = direction,
            action = action,
            proto = protocol,
            ports = ports.map_or_else(|| "all".to_string(), |r| r.to_string()),
            cidr = cidr,
            sep = SEPARATOR,
        );

        Self {
            direction,
            action,
            protocol,
            ports,
            cidr,
            key,
        }
    }

    /// Canonicalize a desired rule.
    ///
    /// An explicit port list yields one canonical rule per port, the same
    /// way it is fanned out at creation time.
    pub fn from_desired(rule: &DesiredRule) -> Result<Vec<Self>> {
        let cidr = parse_cidr(&rule.cidr)?;

        if !rule.ports.is_empty() && rule.protocol.has_ports() {
            return Ok(rule
                .ports
                .iter()
                .map(|port| {
                    Self::new(
                        rule.direction,
                        rule.action,
                        rule.protocol.clone(),
                        Some(PortRange::single(*port)),
                        cidr,
                    )
                })
                .collect());
        }

        let ports = port_range(&rule.protocol, rule.port_start, rule.port_end)?;
        Ok(vec![Self::new(
            rule.direction,
            rule.action,
            rule.protocol.clone(),
            ports,
            cidr,
        )])
    }

    /// Canonicalize a rule reported by the provider
    pub fn from_provider(rule: &ProviderRule) -> Result<Self> {
        let direction = if rule.direction == "Egress" {
            Direction::Out
        } else {
            Direction::In
        };
        let action = match rule.policy.as_deref().map(str::to_ascii_lowercase) {
            None => RuleAction::Allow,
            Some(policy) => match policy.as_str() {
                "allow" | "accept" => RuleAction::Allow,
                "deny" | "drop" => RuleAction::Deny,
                _ => {
                    return Err(SyncError::InvalidRule(format!(
                        "rule {} has unknown policy '{}'",
                        rule.id, policy
                    )));
                }
            },
        };
        let protocol = Protocol::from_provider(&rule.protocol);
        let ports = port_range(&protocol, rule.start_port, rule.end_port)?;
        let cidr = parse_cidr(&rule.allowed_cidr)?;

        Ok(Self::new(direction, action, protocol, ports, cidr))
    }

    /// The string used for equality and ordering
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn action(&self) -> RuleAction {
        self.action
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn ports(&self) -> Option<PortRange> {
        self.ports
    }

    pub fn cidr(&self) -> Ipv4Network {
        self.cidr
    }

    /// Whether this is the `out:allow any 0.0.0.0/0` fallback rule
    pub fn is_allow_all_egress(&self) -> bool {
        self.direction == Direction::Out
            && self.action == RuleAction::Allow
            && self.protocol == Protocol::Any
            && self.cidr.prefix() == 0
    }
}

impl PartialOrd for CanonicalRule {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalRule {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for CanonicalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl AsRef<CanonicalRule> for CanonicalRule {
    fn as_ref(&self) -> &CanonicalRule {
        self
    }
}

/// Parse an IPv4 CIDR and normalize it to its network address.
///
/// An empty string stands for `0.0.0.0/0`.
pub fn parse_cidr(value: &str) -> Result<Ipv4Network> {
    let value = value.trim();
    if value.is_empty() {
        return Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0)
            .map_err(|_| SyncError::InvalidCidr(ANY_CIDR.to_string()));
    }

    let network: Ipv4Network = value
        .parse()
        .map_err(|_| SyncError::InvalidCidr(value.to_string()))?;
    Ipv4Network::new(network.network(), network.prefix())
        .map_err(|_| SyncError::InvalidCidr(value.to_string()))
}

fn covers_all_ports(range: &PortRange) -> bool {
    range.start <= 1 && i32::from(range.end) >= MAX_PORT
}

/// Normalize a raw `start`/`end` pair. Both ends at or below zero mean
/// "all ports", as does anything for a protocol without ports.
fn port_range(protocol: &Protocol, start: i32, end: i32) -> Result<Option<PortRange>> {
    if !protocol.has_ports() || (start <= 0 && end <= 0) {
        return Ok(None);
    }

    let to_port = |port: i32| {
        u16::try_from(port)
            .map_err(|_| SyncError::InvalidRule(format!("port {} out of range", port)))
    };
    let range = PortRange {
        start: to_port(start)?,
        end: to_port(end)?,
    };
    if range.start > range.end {
        return Err(SyncError::InvalidRule(format!(
            "port range {} is reversed",
            range
        )));
    }
    Ok(Some(range))
}
