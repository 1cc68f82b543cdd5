//! Proxy node identity and role

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of the proxy node; selects which traffic directions are compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Proxy co-located with service instances
    #[default]
    Sidecar,
    /// Edge proxy for traffic entering the mesh
    Ingress,
    /// Edge proxy routing between networks
    Router,
    /// Node that only exposes management (health/readiness) ports
    Management,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Sidecar => "sidecar",
            NodeRole::Ingress => "ingress",
            NodeRole::Router => "router",
            NodeRole::Management => "management",
        }
    }

    /// Edge roles have no co-located inbound service traffic
    pub fn is_gateway(&self) -> bool {
        matches!(self, NodeRole::Ingress | NodeRole::Router)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sidecar" => Ok(NodeRole::Sidecar),
            "ingress" => Ok(NodeRole::Ingress),
            "router" => Ok(NodeRole::Router),
            "management" => Ok(NodeRole::Management),
            _ => Err(format!("Invalid node role: {}", s)),
        }
    }
}

/// A proxy instance requesting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub role: NodeRole,
    pub id: String,
    /// DNS search domain of the node, e.g. `default.svc.cluster.local`
    #[serde(default)]
    pub domain: String,
    pub ip_address: String,
}

impl Proxy {
    pub fn new(
        role: NodeRole,
        id: impl Into<String>,
        domain: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self { role, id: id.into(), domain: domain.into(), ip_address: ip_address.into() }
    }

    /// `role~ip~id~domain`, the node identifier proxies announce themselves with
    pub fn service_node(&self) -> String {
        format!("{}~{}~{}~{}", self.role, self.ip_address, self.id, self.domain)
    }
}
