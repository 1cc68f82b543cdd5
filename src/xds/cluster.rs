//! Cluster construction and naming
//!
//! Builds the upstream definitions referenced by routes and listeners: outbound
//! service clusters, statically declared inbound clusters, original-destination
//! clusters and the fixed control-plane clusters. Every outbound name is bounded by
//! [`MAX_CLUSTER_NAME_LENGTH`].

use super::diagnostics::{DiagnosticKind, Diagnostics};
use crate::config::{ControlPlaneAuthPolicy, MeshConfig};
use crate::domain::{service_key, Labels, Port, Protocol, LOCALHOST_ADDRESS};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Longest cluster name the proxy accepts
pub const MAX_CLUSTER_NAME_LENGTH: usize = 189;

/// Width of a hex-encoded SHA-1 digest
const HASH_HEX_LENGTH: usize = 40;

pub const OUTBOUND_CLUSTER_PREFIX: &str = "out.";
pub const INBOUND_CLUSTER_PREFIX: &str = "in.";

/// Identity of the original-destination cluster shared by headless TCP listeners
pub const ORIGINAL_DST_TCP_IDENTITY: &str = "orig-dst-cluster-tcp";

pub const RDS_CLUSTER_NAME: &str = "rds";
pub const LDS_CLUSTER_NAME: &str = "lds";
pub const CDS_CLUSTER_NAME: &str = "cds";
pub const SDS_CLUSTER_NAME: &str = "sds";
pub const ZIPKIN_CLUSTER_NAME: &str = "zipkin";

/// Cluster feature flag enabling HTTP/2 to the upstream
pub const HTTP2_FEATURE: &str = "http2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    /// Endpoints come from service discovery
    Sds,
    StrictDns,
    Static,
    OriginalDst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LbType {
    RoundRobin,
    OriginalDstLb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub url: String,
}

/// TLS material for a cluster or listener. An empty context originates plain TLS
/// without client certificates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SslContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_chain_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert_file: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub verify_subject_alt_name: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_client_certificate: Option<bool>,
}

impl SslContext {
    /// Workload certificates found under `certs_path`
    pub fn from_certs_path(certs_path: &str, subject_alt_names: Vec<String>) -> Self {
        let dir = if certs_path.ends_with('/') { certs_path.to_string() } else { format!("{}/", certs_path) };
        Self {
            cert_chain_file: Some(format!("{}cert-chain.pem", dir)),
            private_key_file: Some(format!("{}key.pem", dir)),
            ca_cert_file: Some(format!("{}root-cert.pem", dir)),
            verify_subject_alt_name: subject_alt_names,
            require_client_certificate: None,
        }
    }

    /// TLS origination towards a service outside the mesh
    pub fn external() -> Self {
        Self::default()
    }
}

/// Upstream cluster definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_name: String,
    pub connect_timeout_ms: u64,
    #[serde(rename = "type")]
    pub cluster_type: ClusterType,
    pub lb_type: LbType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<Host>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_context: Option<SslContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,

    /// Whether the cluster targets an in-mesh service discovered through SDS
    #[serde(skip)]
    pub outbound: bool,
    #[serde(skip)]
    pub hostname: String,
    #[serde(skip)]
    pub port: Option<Port>,
    #[serde(skip)]
    pub labels: Labels,
}

impl Cluster {
    fn new(name: String, cluster_type: ClusterType, lb_type: LbType, connect_timeout_ms: u64) -> Self {
        Self {
            name,
            service_name: String::new(),
            connect_timeout_ms,
            cluster_type,
            lb_type,
            hosts: Vec::new(),
            ssl_context: None,
            features: None,
            outbound: false,
            hostname: String::new(),
            port: None,
            labels: Labels::new(),
        }
    }

    pub fn make_http2(&mut self) {
        self.features = Some(HTTP2_FEATURE.to_string());
    }

    pub fn is_http2(&self) -> bool {
        self.features.as_deref() == Some(HTTP2_FEATURE)
    }

    /// Compare only what the proxy sees
    pub fn same_definition(&self, other: &Cluster) -> bool {
        self.name == other.name
            && self.service_name == other.service_name
            && self.connect_timeout_ms == other.connect_timeout_ms
            && self.cluster_type == other.cluster_type
            && self.lb_type == other.lb_type
            && self.hosts == other.hosts
            && self.ssl_context == other.ssl_context
            && self.features == other.features
    }
}

/// Shorten names over the limit to `prefix + hex(sha1(name))`.
///
/// The result has exactly [`MAX_CLUSTER_NAME_LENGTH`] bytes for ASCII names; a prefix
/// is never cut inside a multi-byte character.
pub fn truncate_cluster_name(name: &str) -> String {
    if name.len() <= MAX_CLUSTER_NAME_LENGTH {
        return name.to_string();
    }

    let mut cut = MAX_CLUSTER_NAME_LENGTH - HASH_HEX_LENGTH;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }

    let digest = ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, name.as_bytes());
    format!("{}{}", &name[..cut], hex::encode(digest.as_ref()))
}

/// Cluster for one service port and optional label subset
pub fn build_outbound_cluster(
    hostname: &str,
    port: &Port,
    labels: &Labels,
    external: bool,
    connect_timeout_ms: u64,
) -> Cluster {
    let key = service_key(hostname, port, labels);
    let name = truncate_cluster_name(&format!("{}{}", OUTBOUND_CLUSTER_PREFIX, key));

    let mut cluster = if external {
        let mut cluster = Cluster::new(name, ClusterType::StrictDns, LbType::RoundRobin, connect_timeout_ms);
        cluster.hosts.push(Host { url: format!("tcp://{}:{}", hostname, port.port) });
        if port.protocol == Protocol::Https {
            cluster.ssl_context = Some(SslContext::external());
        }
        cluster
    } else {
        let mut cluster = Cluster::new(name, ClusterType::Sds, LbType::RoundRobin, connect_timeout_ms);
        cluster.service_name = key;
        cluster.outbound = true;
        cluster
    };

    cluster.hostname = hostname.to_string();
    cluster.port = Some(port.clone());
    cluster.labels = labels.clone();

    if port.protocol.uses_http2() {
        cluster.make_http2();
    }

    cluster
}

/// Statically declared cluster for a local endpoint port
pub fn build_inbound_cluster(port: u16, protocol: Protocol, connect_timeout_ms: u64) -> Cluster {
    let mut cluster = Cluster::new(
        format!("{}{}", INBOUND_CLUSTER_PREFIX, port),
        ClusterType::Static,
        LbType::RoundRobin,
        connect_timeout_ms,
    );
    cluster.hosts.push(Host { url: format!("tcp://{}:{}", LOCALHOST_ADDRESS, port) });

    if protocol.uses_http2() {
        cluster.make_http2();
    }

    cluster
}

/// Cluster forwarding to whatever address the connection was opened to
pub fn build_original_dst_cluster(identity: &str, connect_timeout_ms: u64) -> Cluster {
    let mut cluster = Cluster::new(
        truncate_cluster_name(&format!("{}{}", OUTBOUND_CLUSTER_PREFIX, identity)),
        ClusterType::OriginalDst,
        LbType::OriginalDstLb,
        connect_timeout_ms,
    );
    cluster.outbound = true;
    cluster
}

/// DNS-resolved cluster for a fixed `host:port` address
pub fn build_static_cluster(address: &str, name: &str, connect_timeout_ms: u64) -> Cluster {
    let mut cluster =
        Cluster::new(name.to_string(), ClusterType::StrictDns, LbType::RoundRobin, connect_timeout_ms);
    cluster.hosts.push(Host { url: format!("tcp://{}", address) });
    cluster
}

/// Discovery clusters and, when configured, the tracing collector cluster
pub fn control_plane_clusters(mesh: &MeshConfig) -> Vec<Cluster> {
    let timeout = mesh.connect_timeout_ms;
    let mut clusters: Vec<Cluster> = [RDS_CLUSTER_NAME, LDS_CLUSTER_NAME, CDS_CLUSTER_NAME, SDS_CLUSTER_NAME]
        .iter()
        .map(|name| build_static_cluster(&mesh.discovery_address, name, timeout))
        .collect();

    if mesh.control_plane_auth_policy == ControlPlaneAuthPolicy::MutualTls {
        let ssl_context = SslContext::from_certs_path(&mesh.auth_certs_path, Vec::new());
        for cluster in &mut clusters {
            cluster.ssl_context = Some(ssl_context.clone());
        }
    }

    if let Some(zipkin) = mesh.zipkin_address.as_deref().filter(|a| !a.is_empty()) {
        clusters.push(build_static_cluster(zipkin, ZIPKIN_CLUSTER_NAME, timeout));
    }

    clusters
}

/// Pass-scoped memo of original-destination clusters, keyed by identity
#[derive(Debug, Default)]
pub struct ClusterCache {
    original_dst: HashMap<String, Cluster>,
}

impl ClusterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build on first use, then hand out the same definition
    pub fn original_dst(&mut self, identity: &str, connect_timeout_ms: u64) -> Cluster {
        self.original_dst
            .entry(identity.to_string())
            .or_insert_with(|| build_original_dst_cluster(identity, connect_timeout_ms))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.original_dst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original_dst.is_empty()
    }
}

/// Deduplicate by name (first definition wins) and sort by name
pub fn normalize_clusters(clusters: Vec<Cluster>, diagnostics: &mut Diagnostics) -> Vec<Cluster> {
    let mut by_name: BTreeMap<String, Cluster> = BTreeMap::new();

    for cluster in clusters {
        match by_name.get(&cluster.name) {
            Some(existing) => {
                if !existing.same_definition(&cluster) {
                    diagnostics.record(
                        DiagnosticKind::ConflictingCluster,
                        format!("Cluster {} has conflicting definitions; keeping the first", cluster.name),
                    );
                }
            }
            None => {
                by_name.insert(cluster.name.clone(), cluster);
            }
        }
    }

    by_name.into_values().collect()
}
