//! Common fixtures for integration tests.
//!
//! Builds a small mesh in a `MemoryRegistry`: an HTTP billing service, the reviews
//! service co-located with the test sidecar, a TCP database and a headless cache.

#![allow(dead_code)]

use flowmesh::config::MeshConfig;
use flowmesh::domain::{
    ConfigMeta, DestinationWeight, EgressPort, EgressRule, EgressRuleConfig, Labels, MatchCondition, NodeRole,
    Port, Protocol, Proxy, RouteRule, RouteRuleConfig, Service, StringMatch,
};
use flowmesh::registry::{InstanceRecord, MemoryRegistry};
use flowmesh::xds::{ConfigCompiler, Environment};
use std::sync::Arc;

pub const BILLING: &str = "billing.default.svc.cluster.local";
pub const REVIEWS: &str = "reviews.default.svc.cluster.local";
pub const MYSQL: &str = "mysql.default.svc.cluster.local";
pub const CACHE: &str = "cache.default.svc.cluster.local";

pub const SIDECAR_IP: &str = "10.0.0.5";
pub const NODE_DOMAIN: &str = "default.svc.cluster.local";

pub fn service(hostname: &str, address: Option<&str>, ports: Vec<Port>) -> Service {
    let mut service = Service::new(hostname, ports);
    service.address = address.map(str::to_string);
    service
}

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Registry holding the base mesh with the reviews instance on the sidecar
pub fn mesh_registry() -> MemoryRegistry {
    let mut registry = MemoryRegistry::new();
    registry.add_service(service(BILLING, Some("10.1.0.10"), vec![Port::new("http", 8080, Protocol::Http)]));
    registry.add_service(service(REVIEWS, Some("10.1.0.11"), vec![Port::new("http", 9080, Protocol::Http)]));
    registry.add_service(service(MYSQL, Some("10.1.0.12"), vec![Port::new("mysql", 3306, Protocol::Tcp)]));

    let mut cache = service(CACHE, None, vec![Port::new("redis", 6379, Protocol::Redis)]);
    cache.load_balancing_disabled = true;
    registry.add_service(cache);

    registry.add_instance(InstanceRecord {
        hostname: REVIEWS.to_string(),
        port_name: "http".to_string(),
        address: SIDECAR_IP.to_string(),
        endpoint_port: None,
        labels: labels(&[("version", "v1")]),
    });
    registry
}

pub fn route_rule(name: &str, destination: &str) -> RouteRuleConfig {
    RouteRuleConfig {
        meta: ConfigMeta::new(name, "default"),
        spec: RouteRule { destination: destination.to_string(), ..Default::default() },
    }
}

/// Rule sending `/v2` traffic for `destination` to its `version=v2` subset
pub fn v2_prefix_rule(destination: &str) -> RouteRuleConfig {
    let mut rule = route_rule("billing-v2", destination);
    rule.spec.precedence = 1;
    rule.spec.match_condition =
        Some(MatchCondition { uri: Some(StringMatch::Prefix("/v2".to_string())), ..Default::default() });
    rule.spec.route = vec![DestinationWeight { destination: None, labels: labels(&[("version", "v2")]), weight: 100 }];
    rule
}

pub fn egress_rule(name: &str, destination: &str, ports: &[(u16, Protocol)]) -> EgressRuleConfig {
    EgressRuleConfig {
        meta: ConfigMeta::new(name, "default"),
        spec: EgressRule {
            destination: destination.to_string(),
            ports: ports.iter().map(|(port, protocol)| EgressPort { port: *port, protocol: *protocol }).collect(),
        },
    }
}

pub fn new_compiler(mesh: MeshConfig, registry: MemoryRegistry) -> ConfigCompiler {
    let authn = Arc::new(registry.authn_resolver());
    let registry = Arc::new(registry);
    ConfigCompiler::new(Environment::new(mesh, registry.clone(), registry).with_authn(authn))
}

pub fn sidecar() -> Proxy {
    Proxy::new(NodeRole::Sidecar, "reviews-v1.default", NODE_DOMAIN, SIDECAR_IP)
}

pub fn ingress() -> Proxy {
    Proxy::new(NodeRole::Ingress, "ingress.mesh-system", "mesh-system.svc.cluster.local", "10.0.0.9")
}
