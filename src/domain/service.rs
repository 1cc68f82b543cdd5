//! Service Domain Types
//!
//! Services, their named ports and the protocol tag carried by each port, plus the
//! local instances that back a service on a proxy node.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Instance labels, kept ordered so every rendering is deterministic
pub type Labels = BTreeMap<String, String>;

/// Address that matches every interface
pub const WILDCARD_ADDRESS: &str = "0.0.0.0";

/// Loopback address used for inbound clusters and the sidecar HTTP proxy
pub const LOCALHOST_ADDRESS: &str = "127.0.0.1";

/// Port protocol tag.
///
/// Parsing is the single normalisation point: unknown names become
/// [`Protocol::Unsupported`] and no protocol is silently treated as another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Protocol {
    Http,
    Http2,
    Grpc,
    /// Internally routed RPC protocol carried over the HTTP connection manager
    Bolt,
    Https,
    Tcp,
    Mongo,
    Redis,
    Udp,
    #[default]
    Unsupported,
}

impl Protocol {
    /// Case-insensitive parse; unknown names map to `Unsupported`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Protocol::Http,
            "http2" => Protocol::Http2,
            "grpc" => Protocol::Grpc,
            "bolt" => Protocol::Bolt,
            "https" => Protocol::Https,
            "tcp" => Protocol::Tcp,
            "mongo" => Protocol::Mongo,
            "redis" => Protocol::Redis,
            "udp" => Protocol::Udp,
            _ => Protocol::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Http2 => "HTTP2",
            Protocol::Grpc => "GRPC",
            Protocol::Bolt => "BOLT",
            Protocol::Https => "HTTPS",
            Protocol::Tcp => "TCP",
            Protocol::Mongo => "MONGO",
            Protocol::Redis => "REDIS",
            Protocol::Udp => "UDP",
            Protocol::Unsupported => "UNSUPPORTED",
        }
    }

    /// Protocols served by the HTTP connection manager
    pub fn is_http(&self) -> bool {
        matches!(self, Protocol::Http | Protocol::Http2 | Protocol::Grpc | Protocol::Bolt)
    }

    /// Protocols forwarded as opaque connections
    pub fn is_tcp(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Https | Protocol::Mongo | Protocol::Redis)
    }

    /// Upstreams that must be spoken to over HTTP/2
    pub fn uses_http2(&self) -> bool {
        matches!(self, Protocol::Http2 | Protocol::Grpc)
    }

    /// Protocols an egress rule may expose through the HTTP route tables
    pub fn is_egress_http(&self) -> bool {
        matches!(self, Protocol::Http | Protocol::Http2 | Protocol::Grpc | Protocol::Https)
    }

    /// Protocols an egress rule may expose through TCP listeners
    pub fn is_egress_tcp(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Mongo)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Protocol::parse(&raw))
    }
}

/// Named service port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    #[serde(default)]
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl Port {
    pub fn new(name: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self { name: name.into(), port, protocol }
    }
}

/// A registered service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Fully qualified hostname, the service identity
    pub hostname: String,

    /// Virtual IP (or CIDR range) assigned to the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default)]
    pub ports: Vec<Port>,

    /// Service lives outside the mesh and is reached by DNS name
    #[serde(default)]
    pub external: bool,

    /// Headless service: connections go to the original destination
    #[serde(default)]
    pub load_balancing_disabled: bool,
}

impl Service {
    pub fn new(hostname: impl Into<String>, ports: Vec<Port>) -> Self {
        Self {
            hostname: hostname.into(),
            address: None,
            ports,
            external: false,
            load_balancing_disabled: false,
        }
    }

    /// Stable virtual address, if the service has one
    pub fn virtual_address(&self) -> Option<&str> {
        self.address.as_deref().filter(|a| !a.is_empty() && *a != WILDCARD_ADDRESS)
    }

    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Key identifying this service restricted to one port and label subset
    pub fn key(&self, port: &Port, labels: &Labels) -> String {
        service_key(&self.hostname, port, labels)
    }
}

/// Render labels as `k=v` pairs joined by commas, ordered by key
pub fn labels_to_string(labels: &Labels) -> String {
    labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(",")
}

/// Build `hostname|portname|k=v,...`.
///
/// The port segment is left out only when the port is unnamed and no labels apply.
pub fn service_key(hostname: &str, port: &Port, labels: &Labels) -> String {
    if port.name.is_empty() && labels.is_empty() {
        return hostname.to_string();
    }

    let mut key = format!("{}|{}", hostname, port.name);
    if !labels.is_empty() {
        key.push('|');
        key.push_str(&labels_to_string(labels));
    }
    key
}

/// Concrete endpoint backing a service port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub address: String,
    pub port: u16,
    pub service_port: Port,
}

/// Service instance co-located with a proxy node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub endpoint: NetworkEndpoint,
    pub service: Service,
    #[serde(default)]
    pub labels: Labels,
}
