//! HTTP and TCP route tables
//!
//! Routes are built per destination from routing rules. Each route carries the
//! clusters it references and the fault filters its rule asks for, so later passes can
//! collect both without re-deriving them. Route tables are keyed by listening port
//! and normalised once per pass so repeated compilation renders identically.

use super::cluster::{build_outbound_cluster, Cluster};
use super::diagnostics::{DiagnosticKind, Diagnostics};
use super::filters::HttpFilter;
use super::plugins::PayloadBuilder;
use crate::domain::{Port, Protocol, RouteRuleConfig, Service, StringMatch};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Retry conditions applied to every rule-derived retry policy
pub const DEFAULT_RETRY_ON: &str = "5xx,connect-failure,refused-stream";

/// Decorator operation of the synthesized default route
pub const DEFAULT_ROUTE_OPERATION: &str = "default-route";

/// Route table name covering every port
pub const RDS_ALL: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderMatcher {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub regex: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedClusterEntry {
    pub name: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedCluster {
    pub clusters: Vec<WeightedClusterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    pub retry_on: String,
    pub num_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_try_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decorator {
    pub operation: String,
}

/// One HTTP route of a virtual host
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HttpRoute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderMatcher>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_clusters: Option<WeightedCluster>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_rewrite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_rewrite: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub use_websocket: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub request_headers_to_add: Vec<HeaderValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub opaque_config: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decorator: Option<Decorator>,

    /// Clusters referenced by this route
    #[serde(skip)]
    pub clusters: Vec<Cluster>,
    /// Fault filters requested by the rule, one per target cluster
    #[serde(skip)]
    pub faults: Vec<HttpFilter>,
}

impl HttpRoute {
    /// Whether the match predicate accepts every request
    pub fn is_catch_all(&self) -> bool {
        self.prefix.as_deref() == Some("/")
            && self.path.is_none()
            && self.regex.is_none()
            && self.headers.is_empty()
    }

    pub fn is_redirect(&self) -> bool {
        self.host_redirect.is_some() || self.path_redirect.is_some()
    }
}

/// Lowest-priority route sending everything to `cluster`
pub fn build_default_route(cluster: Cluster) -> HttpRoute {
    HttpRoute {
        prefix: Some("/".to_string()),
        cluster: Some(cluster.name.clone()),
        decorator: Some(Decorator { operation: DEFAULT_ROUTE_OPERATION.to_string() }),
        clusters: vec![cluster],
        ..Default::default()
    }
}

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Translate the rule match into route predicates; no match means prefix `/`
fn build_route_match(rule: &RouteRuleConfig) -> HttpRoute {
    let mut route = HttpRoute::default();
    let condition = rule.spec.match_condition.as_ref();

    match condition.and_then(|c| c.uri.as_ref()) {
        Some(StringMatch::Exact(path)) => route.path = Some(path.clone()),
        Some(StringMatch::Prefix(prefix)) => route.prefix = Some(prefix.clone()),
        Some(StringMatch::Regex(regex)) => route.regex = Some(regex.clone()),
        None => route.prefix = Some("/".to_string()),
    }

    if let Some(condition) = condition {
        // BTreeMap iteration keeps header matchers sorted by name
        for (name, matcher) in &condition.headers {
            let header = match matcher {
                StringMatch::Exact(value) => {
                    HeaderMatcher { name: name.clone(), value: value.clone(), regex: false }
                }
                StringMatch::Prefix(value) => HeaderMatcher {
                    name: name.clone(),
                    value: format!("^{}.*", escape_regex(value)),
                    regex: true,
                },
                StringMatch::Regex(value) => {
                    HeaderMatcher { name: name.clone(), value: value.clone(), regex: true }
                }
            };
            route.headers.push(header);
        }
    }

    route
}

/// Build the route for one rule targeting `service` on `port`
pub fn build_http_route(
    rule: &RouteRuleConfig,
    service: &Service,
    port: &Port,
    connect_timeout_ms: u64,
    payloads: &dyn PayloadBuilder,
) -> HttpRoute {
    let spec = &rule.spec;
    let mut route = build_route_match(rule);

    route.timeout_ms = spec.http_req_timeout_ms.filter(|t| *t > 0);
    route.retry_policy = spec.http_req_retries.as_ref().filter(|r| r.attempts > 0).map(|r| RetryPolicy {
        retry_on: DEFAULT_RETRY_ON.to_string(),
        num_retries: r.attempts,
        per_try_timeout_ms: r.per_try_timeout_ms,
    });
    route.decorator = Some(Decorator { operation: rule.meta.name.clone() });

    if let Some(redirect) = &spec.redirect {
        route.host_redirect = redirect.authority.clone();
        route.path_redirect = redirect.uri.clone();
        return route;
    }

    if spec.route.is_empty() {
        let cluster =
            build_outbound_cluster(&service.hostname, port, &Default::default(), service.external, connect_timeout_ms);
        route.cluster = Some(cluster.name.clone());
        route.clusters.push(cluster);
    } else {
        let mut entries = Vec::with_capacity(spec.route.len());
        for destination in &spec.route {
            let hostname = destination.destination.as_deref().unwrap_or(&service.hostname);
            let cluster =
                build_outbound_cluster(hostname, port, &destination.labels, service.external, connect_timeout_ms);
            entries.push(WeightedClusterEntry { name: cluster.name.clone(), weight: destination.weight });
            route.clusters.push(cluster);
        }

        if entries.len() == 1 {
            route.cluster = Some(entries.remove(0).name);
        } else {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            route.weighted_clusters = Some(WeightedCluster { clusters: entries });
        }
    }

    if let Some(rewrite) = &spec.rewrite {
        route.prefix_rewrite = rewrite.uri.clone();
        route.host_rewrite = rewrite.authority.clone();
    }

    if let Some(fault) = &spec.http_fault {
        route.faults = route
            .clusters
            .iter()
            .filter_map(|cluster| payloads.fault_filter(fault, &cluster.name, &route.headers))
            .collect();
    }

    route.use_websocket = spec.websocket_upgrade;
    route.request_headers_to_add = spec
        .append_headers
        .iter()
        .map(|(key, value)| HeaderValue { key: key.clone(), value: value.clone() })
        .collect();

    route
}

/// Receiving-side mirror of a rule. Only websocket rules need one.
pub fn build_inbound_route(rule: &RouteRuleConfig, cluster: &Cluster) -> Option<HttpRoute> {
    if !rule.spec.websocket_upgrade {
        return None;
    }

    let mut route = build_route_match(rule);
    route.cluster = Some(cluster.name.clone());
    route.clusters.push(cluster.clone());
    route.use_websocket = true;
    route.timeout_ms = rule.spec.http_req_timeout_ms.filter(|t| *t > 0);
    Some(route)
}

/// Labels shared at the end of both dotted names
fn shared_suffix<'a>(a: &[&'a str], b: &[&str]) -> Vec<&'a str> {
    let shared = a.iter().rev().zip(b.iter().rev()).take_while(|(x, y)| x == y).count();
    a[a.len() - shared..].to_vec()
}

/// Every domain under which `service` is reachable on `port`
pub fn build_virtual_host(service: &Service, port: &Port, node_domain: &str, routes: Vec<HttpRoute>) -> VirtualHost {
    let parts: Vec<&str> = service.hostname.split('.').collect();
    let suffix: Vec<&str> = node_domain.split('.').filter(|p| !p.is_empty()).collect();
    let shared = shared_suffix(&parts, &suffix);

    let mut hosts: Vec<String> = Vec::new();
    if !shared.is_empty() {
        let prefix = &parts[..parts.len() - shared.len()];
        for i in 0..shared.len() {
            let host = prefix.iter().chain(shared[..i].iter()).copied().collect::<Vec<_>>().join(".");
            if !host.is_empty() {
                hosts.push(host);
            }
        }
    }
    hosts.push(service.hostname.clone());

    if let Some(address) = service.virtual_address().filter(|a| !a.contains('/')) {
        hosts.push(address.to_string());
    }

    let mut domains = Vec::with_capacity(hosts.len() * 2);
    for host in hosts {
        domains.push(format!("{}:{}", host, port.port));
        domains.push(host);
    }

    VirtualHost { name: service.key(port, &Default::default()), domains, routes }
}

/// Each domain followed by its `domain:port` variant
pub fn append_port_to_domains(domains: &[String], port: u16) -> Vec<String> {
    let mut out = domains.to_vec();
    out.extend(domains.iter().map(|d| format!("{}:{}", d, port)));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<HttpRoute>,
}

impl VirtualHost {
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.routes.iter().flat_map(|r| r.clusters.iter())
    }
}

/// Route table served on one port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRouteConfig {
    pub validate_clusters: bool,
    pub virtual_hosts: Vec<VirtualHost>,
    /// Protocol of the port that contributed the table
    #[serde(skip)]
    pub protocol: Option<Protocol>,
}

impl HttpRouteConfig {
    pub fn new(validate_clusters: bool) -> Self {
        Self { validate_clusters, virtual_hosts: Vec::new(), protocol: None }
    }

    pub fn clusters(&self) -> Vec<Cluster> {
        self.virtual_hosts.iter().flat_map(|v| v.clusters()).cloned().collect()
    }

    /// Sort virtual hosts by name and strip domains already claimed by an earlier host.
    /// Hosts left without domains are dropped. Normalising twice is a no-op.
    pub fn normalize(&mut self, diagnostics: &mut Diagnostics) {
        let mut hosts = std::mem::take(&mut self.virtual_hosts);
        hosts.sort_by(|a, b| a.name.cmp(&b.name));

        let mut claimed: HashSet<String> = HashSet::new();
        let mut seen_names: HashSet<String> = HashSet::new();
        for mut host in hosts {
            if !seen_names.insert(host.name.clone()) {
                continue;
            }

            let before = host.domains.len();
            host.domains.retain(|d| claimed.insert(d.clone()));
            if host.domains.len() < before {
                diagnostics.record(
                    DiagnosticKind::OverlappingDomain,
                    format!(
                        "Virtual host {} dropped {} domain(s) already claimed in the route table",
                        host.name,
                        before - host.domains.len()
                    ),
                );
            }

            if !host.domains.is_empty() {
                self.virtual_hosts.push(host);
            }
        }
    }
}

/// Route tables keyed by listening port
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRouteConfigs {
    validate_clusters: bool,
    configs: BTreeMap<u16, HttpRouteConfig>,
}

impl HttpRouteConfigs {
    pub fn new(validate_clusters: bool) -> Self {
        Self { validate_clusters, configs: BTreeMap::new() }
    }

    pub fn ensure_port(&mut self, port: u16) -> &mut HttpRouteConfig {
        let validate_clusters = self.validate_clusters;
        self.configs.entry(port).or_insert_with(|| HttpRouteConfig::new(validate_clusters))
    }

    pub fn get(&self, port: u16) -> Option<&HttpRouteConfig> {
        self.configs.get(&port)
    }

    pub fn remove(&mut self, port: u16) -> Option<HttpRouteConfig> {
        self.configs.remove(&port)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u16, &HttpRouteConfig)> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn normalize(&mut self, diagnostics: &mut Diagnostics) {
        for config in self.configs.values_mut() {
            config.normalize(diagnostics);
        }
    }

    /// Union of every table in ascending port order
    pub fn combine(&self, diagnostics: &mut Diagnostics) -> HttpRouteConfig {
        let mut out = HttpRouteConfig::new(self.validate_clusters);
        for config in self.configs.values() {
            out.virtual_hosts.extend(config.virtual_hosts.iter().cloned());
        }
        out.normalize(diagnostics);
        out
    }

    /// Every cluster referenced by any table
    pub fn clusters(&self) -> Vec<Cluster> {
        self.configs.values().flat_map(|c| c.clusters()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcpRoute {
    pub cluster: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destination_ip_list: Vec<String>,
    #[serde(skip)]
    pub clusters: Vec<Cluster>,
}

/// Route to `cluster` for connections aimed at `addresses` (any, if empty)
pub fn build_tcp_route(cluster: &Cluster, addresses: &[String]) -> TcpRoute {
    let mut destination_ip_list: Vec<String> = addresses
        .iter()
        .map(|a| if a.contains('/') { a.clone() } else { format!("{}/32", a) })
        .collect();
    destination_ip_list.sort();

    TcpRoute { cluster: cluster.name.clone(), destination_ip_list, clusters: vec![cluster.clone()] }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TcpRouteConfig {
    pub routes: Vec<TcpRoute>,
}

impl TcpRouteConfig {
    pub fn clusters(&self) -> Vec<Cluster> {
        self.routes.iter().flat_map(|r| r.clusters.iter()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ConfigMeta, DestinationWeight, HttpFault, FaultAbort, HttpRetry, Labels, MatchCondition, RouteRule,
        UriAuthority,
    };
    use crate::registry::StandardPayloads;
    use crate::config::MeshConfig;

    fn service() -> Service {
        Service::new("billing.default.svc.cluster.local", vec![Port::new("http", 8080, Protocol::Http)])
    }

    fn payloads() -> StandardPayloads {
        StandardPayloads::new(MeshConfig::default())
    }

    fn rule(name: &str, spec: RouteRule) -> RouteRuleConfig {
        RouteRuleConfig { meta: ConfigMeta::new(name, "default"), spec }
    }

    fn uri(m: StringMatch) -> Option<MatchCondition> {
        Some(MatchCondition { uri: Some(m), ..Default::default() })
    }

    #[test]
    fn test_default_route_is_catch_all() {
        let cluster = build_inbound_cluster_for_test();
        let route = build_default_route(cluster);
        assert!(route.is_catch_all());
        assert_eq!(route.decorator.as_ref().unwrap().operation, DEFAULT_ROUTE_OPERATION);
        assert_eq!(route.clusters.len(), 1);
    }

    fn build_inbound_cluster_for_test() -> Cluster {
        super::super::cluster::build_inbound_cluster(80, Protocol::Http, 1000)
    }

    #[test]
    fn test_prefix_rule_targets_labelled_subset() {
        let svc = service();
        let port = &svc.ports[0];
        let spec = RouteRule {
            destination: svc.hostname.clone(),
            match_condition: uri(StringMatch::Prefix("/v2".into())),
            route: vec![DestinationWeight {
                labels: [("version".to_string(), "v2".to_string())].into_iter().collect(),
                weight: 100,
                ..Default::default()
            }],
            ..Default::default()
        };

        let route = build_http_route(&rule("v2", spec), &svc, port, 1000, &payloads());
        assert_eq!(route.prefix.as_deref(), Some("/v2"));
        assert!(!route.is_catch_all());
        assert_eq!(route.cluster.as_deref(), Some("out.billing.default.svc.cluster.local|http|version=v2"));
        assert!(route.weighted_clusters.is_none());
    }

    #[test]
    fn test_weighted_clusters_sorted() {
        let svc = service();
        let labels = |v: &str| -> Labels { [("version".to_string(), v.to_string())].into_iter().collect() };
        let spec = RouteRule {
            destination: svc.hostname.clone(),
            route: vec![
                DestinationWeight { labels: labels("v2"), weight: 25, ..Default::default() },
                DestinationWeight { labels: labels("v1"), weight: 75, ..Default::default() },
            ],
            ..Default::default()
        };

        let route = build_http_route(&rule("split", spec), &svc, &svc.ports[0], 1000, &payloads());
        let weighted = route.weighted_clusters.as_ref().unwrap();
        assert!(route.cluster.is_none());
        assert_eq!(weighted.clusters[0].weight, 75);
        assert!(weighted.clusters[0].name.ends_with("version=v1"));
        assert_eq!(route.clusters.len(), 2);
        assert!(route.is_catch_all());
    }

    #[test]
    fn test_redirect_has_no_cluster() {
        let svc = service();
        let spec = RouteRule {
            destination: svc.hostname.clone(),
            match_condition: uri(StringMatch::Exact("/old".into())),
            redirect: Some(UriAuthority { uri: Some("/new".into()), authority: Some("other".into()) }),
            ..Default::default()
        };

        let route = build_http_route(&rule("moved", spec), &svc, &svc.ports[0], 1000, &payloads());
        assert!(route.is_redirect());
        assert!(route.cluster.is_none());
        assert!(route.clusters.is_empty());
        assert_eq!(route.path.as_deref(), Some("/old"));
    }

    #[test]
    fn test_headers_retries_and_faults() {
        let svc = service();
        let mut headers = BTreeMap::new();
        headers.insert("x-user".to_string(), StringMatch::Prefix("a.b".into()));
        headers.insert("cookie".to_string(), StringMatch::Exact("x".into()));
        let spec = RouteRule {
            destination: svc.hostname.clone(),
            match_condition: Some(MatchCondition { uri: None, headers }),
            http_req_retries: Some(HttpRetry { attempts: 3, per_try_timeout_ms: Some(200) }),
            http_req_timeout_ms: Some(0),
            http_fault: Some(HttpFault {
                delay: None,
                abort: Some(FaultAbort { percent: 10.0, http_status: 503 }),
            }),
            ..Default::default()
        };

        let route = build_http_route(&rule("faulty", spec), &svc, &svc.ports[0], 1000, &payloads());
        assert_eq!(route.headers[0].name, "cookie");
        assert_eq!(route.headers[1].value, "^a\\.b.*");
        assert!(route.headers[1].regex);
        assert!(!route.is_catch_all());
        assert_eq!(route.timeout_ms, None);
        assert_eq!(route.retry_policy.as_ref().unwrap().retry_on, DEFAULT_RETRY_ON);
        assert_eq!(route.faults.len(), 1);
    }

    #[test]
    fn test_inbound_route_only_for_websocket() {
        let cluster = build_inbound_cluster_for_test();
        let plain = rule("plain", RouteRule { destination: "a".into(), ..Default::default() });
        assert!(build_inbound_route(&plain, &cluster).is_none());

        let ws = rule("ws", RouteRule { destination: "a".into(), websocket_upgrade: true, ..Default::default() });
        let route = build_inbound_route(&ws, &cluster).unwrap();
        assert!(route.use_websocket);
        assert_eq!(route.cluster.as_deref(), Some("in.80"));
    }

    #[test]
    fn test_virtual_host_domains() {
        let mut svc = service();
        svc.address = Some("10.0.0.9".into());
        let host = build_virtual_host(&svc, &svc.ports[0], "default.svc.cluster.local", vec![]);

        assert_eq!(host.name, "billing.default.svc.cluster.local|http");
        for expected in [
            "billing",
            "billing:8080",
            "billing.default",
            "billing.default.svc.cluster",
            "billing.default.svc.cluster.local",
            "billing.default.svc.cluster.local:8080",
            "10.0.0.9",
            "10.0.0.9:8080",
        ] {
            assert!(host.domains.contains(&expected.to_string()), "missing {}", expected);
        }

        svc.address = Some("10.0.0.0/16".into());
        let host = build_virtual_host(&svc, &svc.ports[0], "other.namespace", vec![]);
        assert_eq!(
            host.domains,
            vec!["billing.default.svc.cluster.local:8080", "billing.default.svc.cluster.local"]
        );
    }

    #[test]
    fn test_append_port_to_domains() {
        let domains = append_port_to_domains(&["api.example.com".to_string()], 443);
        assert_eq!(domains, vec!["api.example.com", "api.example.com:443"]);
    }

    #[test]
    fn test_normalize_strips_claimed_domains() {
        let vhost = |name: &str, domains: &[&str]| VirtualHost {
            name: name.into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            routes: vec![],
        };
        let mut config = HttpRouteConfig::new(true);
        config.virtual_hosts = vec![vhost("b", &["x", "y"]), vhost("a", &["x"]), vhost("c", &["x"])];

        let mut diagnostics = Diagnostics::new();
        config.normalize(&mut diagnostics);
        let names: Vec<_> = config.virtual_hosts.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(config.virtual_hosts[1].domains, vec!["y"]);
        assert_eq!(diagnostics.count(DiagnosticKind::OverlappingDomain), 2);

        let snapshot = config.clone();
        config.normalize(&mut diagnostics);
        assert_eq!(config, snapshot);
    }

    #[test]
    fn test_combine_orders_by_port() {
        let mut configs = HttpRouteConfigs::new(false);
        configs.ensure_port(9080).virtual_hosts.push(VirtualHost { name: "z".into(), domains: vec!["z".into()], routes: vec![] });
        configs.ensure_port(80).virtual_hosts.push(VirtualHost { name: "a".into(), domains: vec!["a".into()], routes: vec![] });

        let combined = configs.combine(&mut Diagnostics::new());
        assert!(!combined.validate_clusters);
        let names: Vec<_> = combined.virtual_hosts.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "z"]);
    }

    #[test]
    fn test_tcp_route_addresses() {
        let cluster = build_inbound_cluster_for_test();
        let route = build_tcp_route(&cluster, &["10.1.0.0/16".to_string(), "10.0.0.1".to_string()]);
        assert_eq!(route.destination_ip_list, vec!["10.0.0.1/32", "10.1.0.0/16"]);
        assert_eq!(route.cluster, "in.80");

        let any = build_tcp_route(&cluster, &[]);
        assert!(serde_json::to_value(&any).unwrap().get("destination_ip_list").is_none());
    }
}
