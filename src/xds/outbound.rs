//! Outbound listeners and route tables
//!
//! HTTP-family traffic is grouped into one route table per port and served by a
//! wildcard listener that fetches its table by port name. TCP-family traffic gets
//! either a dedicated listener on the service's virtual address or a shared wildcard
//! listener per port when no stable address exists.

use super::cluster::{build_outbound_cluster, Cluster, ORIGINAL_DST_TCP_IDENTITY};
use super::compiler::CompilePass;
use super::diagnostics::DiagnosticKind;
use super::listener::{
    build_http_listener, build_rpc_listener, build_tcp_listener, listener_address, HttpListenerOptions, Listener,
    TraceOperation,
};
use super::route::{
    build_default_route, build_http_route, build_tcp_route, build_virtual_host, HttpRoute, HttpRouteConfigs,
    TcpRouteConfig,
};
use crate::domain::{sort_route_rules, Port, Protocol, Service, ServiceInstance, WILDCARD_ADDRESS};
use crate::errors::Result;

/// Routes for traffic to `service` on `port`, rule-derived routes first.
///
/// A default route to the service's base cluster closes the list unless a rule
/// already matches every request.
pub fn build_destination_routes(
    pass: &mut CompilePass<'_>,
    service: &Service,
    port: &Port,
    instances: &[ServiceInstance],
) -> Result<Vec<HttpRoute>> {
    let env = pass.env;
    let timeout = pass.connect_timeout_ms();
    let mut routes = Vec::new();

    if port.protocol.is_http() {
        let mut rules = env.config_store.route_rules(instances, &service.hostname)?;
        sort_route_rules(&mut rules);

        let opaque_config = env
            .mesh
            .policy_enabled()
            .then(|| env.payloads.route_policy_config(pass.node, &service.hostname, instances, true));

        let mut catch_all = false;
        for rule in &rules {
            let mut route = build_http_route(rule, service, port, timeout, env.payloads.as_ref());
            if let Some(opaque) = &opaque_config {
                route.opaque_config = opaque.clone();
            }
            catch_all = route.is_catch_all();
            routes.push(route);
            if catch_all {
                break;
            }
        }

        if !catch_all {
            let cluster = build_outbound_cluster(&service.hostname, port, &Default::default(), service.external, timeout);
            let mut route = build_default_route(cluster);
            if let Some(opaque) = opaque_config {
                route.opaque_config = opaque;
            }
            routes.push(route);
        }
    } else if port.protocol == Protocol::Https && service.external {
        // external HTTPS names are spoken to in plain text; the cluster originates TLS
        let cluster = build_outbound_cluster(&service.hostname, port, &Default::default(), true, timeout);
        routes.push(build_default_route(cluster));
    } else if !port.protocol.is_tcp() {
        pass.diagnostics.record(
            DiagnosticKind::UnsupportedProtocol,
            format!("Unsupported outbound protocol {} for port {} of {}", port.protocol, port.port, service.hostname),
        );
    }

    Ok(routes)
}

/// One route table per HTTP-family port across every service
pub fn build_outbound_route_tables(
    pass: &mut CompilePass<'_>,
    services: &[Service],
    instances: &[ServiceInstance],
) -> Result<HttpRouteConfigs> {
    let mut tables = HttpRouteConfigs::new(pass.options.validate_clusters);

    for service in services {
        for port in &service.ports {
            let routes = build_destination_routes(pass, service, port, instances)?;
            if routes.is_empty() {
                continue;
            }

            let host = build_virtual_host(service, port, &pass.node.domain, routes);
            let table = tables.ensure_port(port.port);
            table.protocol = Some(port.protocol);
            table.virtual_hosts.push(host);
        }
    }

    tables.normalize(&mut pass.diagnostics);
    Ok(tables)
}

/// Listeners for every outbound port plus the clusters they reference
pub fn build_outbound_listeners(
    pass: &mut CompilePass<'_>,
    services: &[Service],
    instances: &[ServiceInstance],
    tables: &HttpRouteConfigs,
) -> Result<(Vec<Listener>, Vec<Cluster>)> {
    let (mut listeners, mut clusters) = build_outbound_http_listeners(pass, instances, tables);

    let (tcp_listeners, tcp_clusters) = build_outbound_tcp_listeners(pass, services);
    listeners.extend(tcp_listeners);
    clusters.extend(tcp_clusters);

    let (egress_listeners, egress_clusters) = super::egress::build_egress_tcp_listeners(pass)?;
    listeners.extend(egress_listeners);
    clusters.extend(egress_clusters);

    Ok((listeners, clusters))
}

/// Wildcard HTTP listener per route table, each fetching its table by port number
pub fn build_outbound_http_listeners(
    pass: &mut CompilePass<'_>,
    instances: &[ServiceInstance],
    tables: &HttpRouteConfigs,
) -> (Vec<Listener>, Vec<Cluster>) {
    let env = pass.env;
    let gateway = pass.node.role.is_gateway();
    let mut listeners = Vec::with_capacity(tables.len());

    for (port, table) in tables.iter() {
        let opts = HttpListenerOptions {
            mesh: &env.mesh,
            node: pass.node,
            instances,
            payloads: env.payloads.as_ref(),
            route_config: Some(table),
            ip: WILDCARD_ADDRESS,
            port: *port,
            rds: Some(port.to_string()),
            use_remote_address: gateway,
            direction: if gateway { TraceOperation::Ingress } else { TraceOperation::Egress },
            outbound: true,
            authn_policy: None,
        };

        let listener = if table.protocol == Some(Protocol::Bolt) {
            build_rpc_listener(opts)
        } else {
            build_http_listener(opts)
        };
        listeners.push(listener);
    }

    (listeners, tables.clusters())
}

/// TCP-family listeners for in-mesh services
pub fn build_outbound_tcp_listeners(
    pass: &mut CompilePass<'_>,
    services: &[Service],
) -> (Vec<Listener>, Vec<Cluster>) {
    let timeout = pass.connect_timeout_ms();
    let gateway = pass.node.role.is_gateway();

    let mut listeners = Vec::new();
    let mut clusters = Vec::new();
    for service in services.iter().filter(|s| !s.external) {
        for port in service.ports.iter().filter(|p| p.protocol.is_tcp()) {
            // a CIDR range cannot be a bind address
            let address = service.virtual_address().filter(|a| !a.contains('/'));

            if service.load_balancing_disabled || address.is_none() || gateway {
                if !pass.claim_wildcard_port(port.port) {
                    pass.diagnostics.record(
                        DiagnosticKind::DuplicateWildcardPort,
                        format!(
                            "Skipping TCP listener for {} port {}: {} is already claimed",
                            service.hostname,
                            port.port,
                            listener_address(WILDCARD_ADDRESS, port.port)
                        ),
                    );
                    continue;
                }

                let cluster = if service.load_balancing_disabled && !gateway {
                    pass.clusters.original_dst(ORIGINAL_DST_TCP_IDENTITY, timeout)
                } else {
                    build_outbound_cluster(&service.hostname, port, &Default::default(), false, timeout)
                };

                let route_config = TcpRouteConfig { routes: vec![build_tcp_route(&cluster, &[])] };
                listeners.push(build_tcp_listener(
                    route_config,
                    WILDCARD_ADDRESS,
                    port.port,
                    port.protocol,
                    &mut pass.diagnostics,
                ));
                clusters.push(cluster);
            } else if let Some(address) = address {
                let cluster = build_outbound_cluster(&service.hostname, port, &Default::default(), false, timeout);
                let route_config =
                    TcpRouteConfig { routes: vec![build_tcp_route(&cluster, &[address.to_string()])] };
                listeners.push(build_tcp_listener(
                    route_config,
                    address,
                    port.port,
                    port.protocol,
                    &mut pass.diagnostics,
                ));
                clusters.push(cluster);
            }
        }
    }

    (listeners, clusters)
}
