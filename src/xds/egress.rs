//! Egress traffic to destinations admitted by egress rules
//!
//! HTTP-family egress ports contribute virtual hosts to the shared outbound route
//! tables; TCP-family ports get one wildcard listener per port. Every (rule, port)
//! pair has its own original-destination cluster so it can be tuned independently.
//! Gateway nodes ignore egress rules.

use super::cluster::{build_original_dst_cluster, Cluster, SslContext};
use super::compiler::CompilePass;
use super::diagnostics::DiagnosticKind;
use super::listener::{build_tcp_listener, listener_address, Listener};
use super::outbound::build_destination_routes;
use super::route::{append_port_to_domains, build_tcp_route, HttpRouteConfigs, TcpRoute, TcpRouteConfig, VirtualHost};
use crate::domain::{service_key, EgressRuleConfig, Labels, Port, Protocol, Service, ServiceInstance, WILDCARD_ADDRESS};
use crate::errors::Result;
use std::collections::BTreeMap;
use tracing::debug;

/// Port name synthesized for an egress rule port
fn egress_port(port: u16, protocol: Protocol) -> Port {
    Port::new(format!("external-{}-{}", protocol, port), port, protocol)
}

/// Original-destination cluster owned by one egress destination and port
fn build_egress_cluster(destination: &str, port: &Port, connect_timeout_ms: u64) -> Cluster {
    let key = service_key(destination, port, &Labels::new());
    let mut cluster = build_original_dst_cluster(&key, connect_timeout_ms);
    cluster.service_name = key;
    cluster.hostname = destination.to_string();
    cluster.port = Some(port.clone());
    cluster
}

/// Virtual host sending every request for `rule` on `port` through its egress cluster
fn build_egress_virtual_host(
    pass: &mut CompilePass<'_>,
    rule: &EgressRuleConfig,
    port: &Port,
    instances: &[ServiceInstance],
) -> Result<VirtualHost> {
    let env = pass.env;
    let destination = rule.spec.destination.as_str();
    let protocol = if port.protocol == Protocol::Grpc { Protocol::Http2 } else { port.protocol };

    let mut cluster = build_egress_cluster(destination, port, pass.connect_timeout_ms());
    match protocol {
        Protocol::Https => cluster.ssl_context = Some(SslContext::external()),
        Protocol::Http2 => cluster.make_http2(),
        _ => {}
    }

    // applications speak plain HTTP to external HTTPS hosts; the cluster originates TLS
    let mut route_port = port.clone();
    if protocol == Protocol::Https {
        route_port.protocol = Protocol::Http;
    }

    let service = Service::new(destination, Vec::new());
    let mut routes = build_destination_routes(pass, &service, &route_port, instances)?;

    let opaque_config = env
        .mesh
        .policy_enabled()
        .then(|| env.payloads.route_policy_config(pass.node, &rule.meta.mesh_name(), instances, true));

    for route in &mut routes {
        if let Some(opaque) = &opaque_config {
            route.opaque_config = opaque.clone();
        }
        if !route.is_redirect() {
            route.cluster = Some(cluster.name.clone());
            route.weighted_clusters = None;
        }
        route.clusters = vec![cluster.clone()];
    }

    Ok(VirtualHost {
        name: format!("{}:{}", destination, port.port),
        domains: append_port_to_domains(&[destination.to_string()], port.port),
        routes,
    })
}

/// Merge egress virtual hosts into the per-port route tables
pub fn build_egress_http_routes(
    pass: &mut CompilePass<'_>,
    instances: &[ServiceInstance],
    tables: &mut HttpRouteConfigs,
) -> Result<()> {
    if pass.node.role.is_gateway() {
        return Ok(());
    }

    let rules = pass.egress_rules()?;
    for rule in &rules {
        for egress in rule.spec.ports.iter().filter(|p| p.protocol.is_egress_http()) {
            let port = egress_port(egress.port, egress.protocol);
            let host = build_egress_virtual_host(pass, rule, &port, instances)?;
            debug!(rule = %rule.meta.key(), host = %host.name, "Adding egress virtual host");

            let table = tables.ensure_port(port.port);
            table.protocol = Some(port.protocol);
            table.virtual_hosts.push(host);
        }
    }

    tables.normalize(&mut pass.diagnostics);
    Ok(())
}

/// One wildcard TCP listener per egress port, routing each rule to its own cluster
pub fn build_egress_tcp_listeners(pass: &mut CompilePass<'_>) -> Result<(Vec<Listener>, Vec<Cluster>)> {
    if pass.node.role.is_gateway() {
        return Ok((Vec::new(), Vec::new()));
    }

    let rules = pass.egress_rules()?;
    let timeout = pass.connect_timeout_ms();

    // several rules may share a port; the last declared protocol applies to the listener
    let mut by_port: BTreeMap<u16, (Protocol, Vec<&EgressRuleConfig>)> = BTreeMap::new();
    for rule in &rules {
        for egress in rule.spec.ports.iter().filter(|p| p.protocol.is_egress_tcp()) {
            let entry = by_port.entry(egress.port).or_insert_with(|| (egress.protocol, Vec::new()));
            entry.0 = egress.protocol;
            entry.1.push(rule);
        }
    }

    let mut listeners = Vec::with_capacity(by_port.len());
    let mut clusters = Vec::new();

    for (port_number, (protocol, port_rules)) in by_port {
        if !pass.claim_wildcard_port(port_number) {
            pass.diagnostics.record(
                DiagnosticKind::DuplicateWildcardPort,
                format!(
                    "Skipping egress TCP listener for {}: {} is already claimed",
                    port_rules.iter().map(|r| r.spec.destination.as_str()).collect::<Vec<_>>().join(","),
                    listener_address(WILDCARD_ADDRESS, port_number)
                ),
            );
            continue;
        }

        let port = egress_port(port_number, protocol);
        let routes: Vec<TcpRoute> = port_rules
            .iter()
            .map(|rule| {
                let destination = rule.spec.destination.clone();
                let cluster = build_egress_cluster(&destination, &port, timeout);
                let route = build_tcp_route(&cluster, &[destination]);
                clusters.push(cluster);
                route
            })
            .collect();

        listeners.push(build_tcp_listener(
            TcpRouteConfig { routes },
            WILDCARD_ADDRESS,
            port_number,
            protocol,
            &mut pass.diagnostics,
        ));
    }

    Ok((listeners, clusters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompileOptions, MeshConfig};
    use crate::domain::{ConfigMeta, EgressPort, EgressRule, NodeRole, Proxy};
    use crate::registry::MemoryRegistry;
    use crate::xds::cluster::ClusterType;
    use crate::xds::diagnostics::DiagnosticKind;
    use crate::xds::plugins::Environment;
    use std::sync::Arc;

    fn egress_rule(name: &str, destination: &str, ports: &[(u16, Protocol)]) -> EgressRuleConfig {
        EgressRuleConfig {
            meta: ConfigMeta::new(name, "default"),
            spec: EgressRule {
                destination: destination.into(),
                ports: ports.iter().map(|(port, protocol)| EgressPort { port: *port, protocol: *protocol }).collect(),
            },
        }
    }

    fn env(rules: Vec<EgressRuleConfig>) -> Environment {
        let mut registry = MemoryRegistry::new();
        for rule in rules {
            registry.add_egress_rule(rule);
        }
        let registry = Arc::new(registry);
        Environment::new(MeshConfig::default(), registry.clone(), registry)
    }

    fn sidecar() -> Proxy {
        Proxy::new(NodeRole::Sidecar, "app.default", "default.svc.cluster.local", "10.0.0.5")
    }

    #[test]
    fn test_https_egress_originates_tls() {
        let env = env(vec![egress_rule("google", "*.google.com", &[(443, Protocol::Https)])]);
        let node = sidecar();
        let mut pass = CompilePass::new(&env, &node, CompileOptions::default());
        let mut tables = HttpRouteConfigs::new(true);

        build_egress_http_routes(&mut pass, &[], &mut tables).unwrap();

        let table = tables.get(443).unwrap();
        let host = &table.virtual_hosts[0];
        assert_eq!(host.name, "*.google.com:443");
        assert_eq!(host.domains, vec!["*.google.com", "*.google.com:443"]);

        let route = &host.routes[0];
        let cluster = &route.clusters[0];
        assert_eq!(route.cluster.as_deref(), Some(cluster.name.as_str()));
        assert_eq!(cluster.name, "out.*.google.com|external-HTTPS-443");
        assert_eq!(cluster.cluster_type, ClusterType::OriginalDst);
        assert_eq!(cluster.ssl_context, Some(SslContext::external()));
    }

    #[test]
    fn test_grpc_egress_cluster_speaks_http2() {
        let env = env(vec![egress_rule("grpc", "api.example.com", &[(8443, Protocol::Grpc)])]);
        let node = sidecar();
        let mut pass = CompilePass::new(&env, &node, CompileOptions::default());
        let mut tables = HttpRouteConfigs::new(true);

        build_egress_http_routes(&mut pass, &[], &mut tables).unwrap();
        let cluster = &tables.get(8443).unwrap().virtual_hosts[0].routes[0].clusters[0];
        assert!(cluster.is_http2());
        assert!(cluster.ssl_context.is_none());
    }

    #[test]
    fn test_tcp_egress_groups_rules_by_port() {
        let env = env(vec![
            egress_rule("a", "10.10.0.0/16", &[(3306, Protocol::Tcp)]),
            egress_rule("b", "10.20.0.0/16", &[(3306, Protocol::Tcp)]),
            egress_rule("c", "10.30.0.0/16", &[(27017, Protocol::Mongo)]),
        ]);
        let node = sidecar();
        let mut pass = CompilePass::new(&env, &node, CompileOptions::default());

        let (listeners, clusters) = build_egress_tcp_listeners(&mut pass).unwrap();
        let names: Vec<_> = listeners.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["tcp_0.0.0.0_3306", "mongo_0.0.0.0_27017"]);
        assert_eq!(clusters.len(), 3);

        let routes = &listeners[0].filters[0].tcp_proxy().unwrap().route_config.routes;
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].destination_ip_list, vec!["10.10.0.0/16"]);
    }

    #[test]
    fn test_gateway_ignores_egress() {
        let env = env(vec![
            egress_rule("a", "api.example.com", &[(80, Protocol::Http)]),
            egress_rule("b", "10.10.0.0/16", &[(3306, Protocol::Tcp)]),
        ]);
        let node = Proxy::new(NodeRole::Ingress, "ingress", "mesh-system.svc.cluster.local", "10.0.0.9");
        let mut pass = CompilePass::new(&env, &node, CompileOptions::default());
        let mut tables = HttpRouteConfigs::new(true);

        build_egress_http_routes(&mut pass, &[], &mut tables).unwrap();
        let (listeners, clusters) = build_egress_tcp_listeners(&mut pass).unwrap();
        assert!(tables.is_empty());
        assert!(listeners.is_empty() && clusters.is_empty());
    }

    #[test]
    fn test_rejected_rules_recorded_once() {
        let env = env(vec![
            egress_rule("a", "api.example.com", &[(80, Protocol::Http)]),
            egress_rule("b", "API.example.com", &[(3306, Protocol::Tcp)]),
        ]);
        let node = sidecar();
        let mut pass = CompilePass::new(&env, &node, CompileOptions::default());
        let mut tables = HttpRouteConfigs::new(true);

        build_egress_http_routes(&mut pass, &[], &mut tables).unwrap();
        let (listeners, _) = build_egress_tcp_listeners(&mut pass).unwrap();

        assert!(listeners.is_empty());
        assert_eq!(tables.len(), 1);
        assert_eq!(pass.diagnostics.count(DiagnosticKind::RejectedEgressRule), 1);
    }
}
