//! Listener construction
//!
//! A listener is an accept point with an ordered list of network filters. HTTP-family
//! listeners carry a single HTTP connection manager wrapping the filter chain; TCP
//! listeners forward connections through a route table, with protocol-aware filters
//! for Mongo and Redis.

use super::cluster::RDS_CLUSTER_NAME;
use super::diagnostics::{DiagnosticKind, Diagnostics};
use super::filters::{build_filter_chain, fault_filters, ChainFlavor, HttpFilter};
use super::plugins::PayloadBuilder;
use super::route::{HttpRouteConfig, TcpRouteConfig};
use crate::config::MeshConfig;
use crate::domain::{AuthnPolicy, Protocol, Proxy, ServiceInstance};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

pub const HTTP_CONNECTION_MANAGER: &str = "http_connection_manager";
pub const TCP_PROXY_FILTER: &str = "tcp_proxy";
pub const MONGO_PROXY_FILTER: &str = "mongo_proxy";
pub const REDIS_PROXY_FILTER: &str = "redis_proxy";
pub const POLICY_NETWORK_FILTER: &str = "mixer";
pub const OUTBOUND_RPC_FILTER: &str = "outbound_bolt";
pub const INBOUND_RPC_FILTER: &str = "bolt_inbound";

/// Name of the listener receiving redirected traffic
pub const VIRTUAL_LISTENER_NAME: &str = "virtual";

/// Operation timeout of the standalone Redis filter
pub const REDIS_DEFAULT_OP_TIMEOUT_MS: u64 = 30_000;

/// Render a listener address
pub fn listener_address(ip: &str, port: u16) -> String {
    format!("tcp://{}:{}", ip, port)
}

/// Trace operation tag of an HTTP listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOperation {
    Ingress,
    Egress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFilterType {
    Read,
    Write,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rds {
    pub cluster: String,
    pub route_config_name: String,
    pub refresh_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceConfig {
    pub operation_name: TraceOperation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessLog {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpConnectionManagerConfig {
    pub codec_type: String,
    pub stat_prefix: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_request_id: bool,
    pub use_remote_address: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TraceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rds: Option<Rds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_config: Option<HttpRouteConfig>,
    pub filters: Vec<HttpFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub access_log: Vec<AccessLog>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcpProxyConfig {
    pub stat_prefix: String,
    pub route_config: TcpRouteConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MongoProxyConfig {
    pub stat_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedisConnPool {
    pub op_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedisProxyConfig {
    pub cluster_name: String,
    pub stat_prefix: String,
    pub conn_pool: RedisConnPool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NetworkFilterConfig {
    HttpConnectionManager(Box<HttpConnectionManagerConfig>),
    TcpProxy(TcpProxyConfig),
    MongoProxy(MongoProxyConfig),
    RedisProxy(RedisProxyConfig),
    Opaque(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkFilter {
    #[serde(rename = "type")]
    pub filter_type: NetworkFilterType,
    pub name: String,
    pub config: NetworkFilterConfig,
}

impl NetworkFilter {
    pub fn connection_manager(&self) -> Option<&HttpConnectionManagerConfig> {
        match &self.config {
            NetworkFilterConfig::HttpConnectionManager(config) => Some(config),
            _ => None,
        }
    }

    pub fn tcp_proxy(&self) -> Option<&TcpProxyConfig> {
        match &self.config {
            NetworkFilterConfig::TcpProxy(config) => Some(config),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listener {
    pub name: String,
    pub address: String,
    pub filters: Vec<NetworkFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_context: Option<super::cluster::SslContext>,
    pub bind_to_port: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub use_original_dst: bool,
}

impl Listener {
    fn new(prefix: &str, ip: &str, port: u16, filters: Vec<NetworkFilter>) -> Self {
        Self {
            name: format!("{}_{}_{}", prefix, ip, port),
            address: listener_address(ip, port),
            filters,
            ssl_context: None,
            bind_to_port: true,
            use_original_dst: false,
        }
    }

    /// Listener receiving redirected traffic, handed to the listener owning the original destination
    pub fn virtual_listener(port: u16) -> Self {
        Self {
            name: VIRTUAL_LISTENER_NAME.to_string(),
            address: listener_address(crate::domain::WILDCARD_ADDRESS, port),
            filters: Vec::new(),
            ssl_context: None,
            bind_to_port: true,
            use_original_dst: true,
        }
    }

    pub fn connection_manager(&self) -> Option<&HttpConnectionManagerConfig> {
        self.filters.iter().find_map(|f| f.connection_manager())
    }
}

/// Inputs of an HTTP-family listener
pub struct HttpListenerOptions<'a> {
    pub mesh: &'a MeshConfig,
    pub node: &'a Proxy,
    pub instances: &'a [ServiceInstance],
    pub payloads: &'a dyn PayloadBuilder,
    /// Table embedded when `rds` is unset; its fault specs feed the filter chain either way
    pub route_config: Option<&'a HttpRouteConfig>,
    pub ip: &'a str,
    pub port: u16,
    /// Route table name served out of band
    pub rds: Option<String>,
    pub use_remote_address: bool,
    pub direction: TraceOperation,
    pub outbound: bool,
    pub authn_policy: Option<&'a AuthnPolicy>,
}

fn build_connection_manager(
    opts: &HttpListenerOptions<'_>,
    flavor: ChainFlavor,
    stat_prefix: &str,
) -> HttpConnectionManagerConfig {
    let policy_filter = opts
        .mesh
        .policy_enabled()
        .then(|| opts.payloads.http_policy_filter(opts.node, opts.instances, opts.outbound));

    let filters =
        build_filter_chain(flavor, opts.authn_policy, policy_filter, fault_filters(opts.route_config));

    let mut config = HttpConnectionManagerConfig {
        codec_type: "auto".to_string(),
        stat_prefix: stat_prefix.to_string(),
        generate_request_id: false,
        use_remote_address: opts.use_remote_address,
        tracing: None,
        rds: None,
        route_config: None,
        filters,
        access_log: Vec::new(),
    };

    if let Some(path) = opts.mesh.access_log_file.as_deref().filter(|p| !p.is_empty()) {
        config.access_log.push(AccessLog { path: path.to_string() });
    }

    if opts.mesh.enable_tracing {
        config.generate_request_id = true;
        config.tracing = Some(TraceConfig { operation_name: opts.direction });
    }

    match &opts.rds {
        Some(name) => {
            config.rds = Some(Rds {
                cluster: RDS_CLUSTER_NAME.to_string(),
                route_config_name: name.clone(),
                refresh_delay_ms: opts.mesh.rds_refresh_delay_ms,
            })
        }
        None => config.route_config = opts.route_config.cloned(),
    }

    config
}

/// Standard HTTP listener
pub fn build_http_listener(opts: HttpListenerOptions<'_>) -> Listener {
    let config = build_connection_manager(&opts, ChainFlavor::Standard, "http");
    Listener::new(
        "http",
        opts.ip,
        opts.port,
        vec![NetworkFilter {
            filter_type: NetworkFilterType::Read,
            name: HTTP_CONNECTION_MANAGER.to_string(),
            config: NetworkFilterConfig::HttpConnectionManager(Box::new(config)),
        }],
    )
}

/// RPC (BOLT) listener, named after its direction
pub fn build_rpc_listener(opts: HttpListenerOptions<'_>) -> Listener {
    let config = build_connection_manager(&opts, ChainFlavor::Rpc, "bolt");
    let filter_name = if opts.outbound { OUTBOUND_RPC_FILTER } else { INBOUND_RPC_FILTER };
    Listener::new(
        "bolt",
        opts.ip,
        opts.port,
        vec![NetworkFilter {
            filter_type: NetworkFilterType::Read,
            name: filter_name.to_string(),
            config: NetworkFilterConfig::HttpConnectionManager(Box::new(config)),
        }],
    )
}

/// TCP listener; Mongo stacks its filter before forwarding, single-route Redis
/// replaces forwarding entirely
pub fn build_tcp_listener(
    route_config: TcpRouteConfig,
    ip: &str,
    port: u16,
    protocol: Protocol,
    diagnostics: &mut Diagnostics,
) -> Listener {
    match protocol {
        Protocol::Mongo => {
            return Listener::new(
                "mongo",
                ip,
                port,
                vec![
                    NetworkFilter {
                        filter_type: NetworkFilterType::Both,
                        name: MONGO_PROXY_FILTER.to_string(),
                        config: NetworkFilterConfig::MongoProxy(MongoProxyConfig {
                            stat_prefix: "mongo".to_string(),
                        }),
                    },
                    tcp_proxy_filter(route_config),
                ],
            );
        }
        Protocol::Redis => {
            if route_config.routes.len() == 1 {
                let cluster_name = route_config.routes[0].cluster.clone();
                return Listener::new(
                    "redis",
                    ip,
                    port,
                    vec![NetworkFilter {
                        filter_type: NetworkFilterType::Both,
                        name: REDIS_PROXY_FILTER.to_string(),
                        config: NetworkFilterConfig::RedisProxy(RedisProxyConfig {
                            cluster_name,
                            stat_prefix: "redis".to_string(),
                            conn_pool: RedisConnPool { op_timeout_ms: REDIS_DEFAULT_OP_TIMEOUT_MS },
                        }),
                    }],
                );
            }
            diagnostics.record(
                DiagnosticKind::RedisMultiRoute,
                format!(
                    "Redis listener {} has {} routes; falling back to TCP forwarding",
                    listener_address(ip, port),
                    route_config.routes.len()
                ),
            );
        }
        _ => {}
    }

    Listener::new("tcp", ip, port, vec![tcp_proxy_filter(route_config)])
}

fn tcp_proxy_filter(route_config: TcpRouteConfig) -> NetworkFilter {
    NetworkFilter {
        filter_type: NetworkFilterType::Read,
        name: TCP_PROXY_FILTER.to_string(),
        config: NetworkFilterConfig::TcpProxy(TcpProxyConfig { stat_prefix: "tcp".to_string(), route_config }),
    }
}

/// Policy/telemetry network filter placed in front of inbound TCP forwarding
pub fn policy_network_filter(config: Value) -> NetworkFilter {
    NetworkFilter {
        filter_type: NetworkFilterType::Both,
        name: POLICY_NETWORK_FILTER.to_string(),
        config: NetworkFilterConfig::Opaque(config),
    }
}

/// First listener bound to `address`
pub fn find_by_address<'a>(listeners: &'a [Listener], address: &str) -> Option<&'a Listener> {
    listeners.iter().find(|l| l.address == address)
}

/// Drop repeated (name, address) pairs, report conflicting duplicates and different
/// listeners sharing an address, and sort by (address, name)
pub fn normalize_listeners(listeners: Vec<Listener>, diagnostics: &mut Diagnostics) -> Vec<Listener> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut out: Vec<Listener> = Vec::with_capacity(listeners.len());

    for listener in listeners {
        if !seen.insert((listener.name.clone(), listener.address.clone())) {
            let conflicting = out
                .iter()
                .any(|kept| kept.name == listener.name && kept.address == listener.address && *kept != listener);
            if conflicting {
                diagnostics.record(
                    DiagnosticKind::ListenerAddressCollision,
                    format!("Dropping listener {} at {}: an earlier definition differs", listener.name, listener.address),
                );
            }
            continue;
        }
        if let Some(existing) = find_by_address(&out, &listener.address) {
            diagnostics.record(
                DiagnosticKind::ListenerAddressCollision,
                format!(
                    "Listeners {} and {} share address {}",
                    existing.name, listener.name, listener.address
                ),
            );
        }
        out.push(listener);
    }

    out.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.name.cmp(&b.name)));
    out
}
