//! Inbound listeners for service instances co-located with the proxy
//!
//! Every local endpoint gets a statically declared cluster pointing at localhost and a
//! listener on the endpoint address. HTTP-family endpoints serve a single virtual host
//! matching any domain; TCP-family endpoints forward connections to the endpoint.

use super::cluster::{build_inbound_cluster, Cluster};
use super::compiler::CompilePass;
use super::diagnostics::DiagnosticKind;
use super::listener::{
    build_http_listener, build_rpc_listener, build_tcp_listener, policy_network_filter,
    HttpListenerOptions, Listener, TraceOperation,
};
use super::route::{
    build_default_route, build_inbound_route, build_tcp_route, HttpRouteConfig, TcpRouteConfig,
    VirtualHost,
};
use crate::domain::{sort_route_rules, Protocol, RouteRuleConfig, ServiceInstance};
use crate::errors::Result;

/// Listeners and clusters for the node's own instances
pub fn build_inbound_listeners(
    pass: &mut CompilePass<'_>,
    instances: &[ServiceInstance],
) -> Result<(Vec<Listener>, Vec<Cluster>)> {
    let env = pass.env;
    let mesh = &env.mesh;
    let timeout = mesh.connect_timeout_ms;

    let rules: Vec<RouteRuleConfig> =
        if instances.iter().any(|i| i.endpoint.service_port.protocol == Protocol::Http) {
            let mut rules = env.config_store.route_rules_by_destination(instances)?;
            sort_route_rules(&mut rules);
            rules
        } else {
            Vec::new()
        };

    let mut listeners = Vec::with_capacity(instances.len());
    let mut clusters = Vec::with_capacity(instances.len());

    for instance in instances {
        let endpoint = &instance.endpoint;
        let protocol = endpoint.service_port.protocol;
        let cluster = build_inbound_cluster(endpoint.port, protocol, timeout);
        clusters.push(cluster.clone());

        let authn_policy = env.authn.resolve(&instance.service.hostname, &endpoint.service_port);

        let mut listener = if protocol.is_http() {
            let opaque_config = mesh.policy_enabled().then(|| {
                env.payloads.route_policy_config(pass.node, &instance.service.hostname, instances, false)
            });

            let mut routes = Vec::new();
            if protocol == Protocol::Http {
                for rule in &rules {
                    if let Some(mut route) = build_inbound_route(rule, &cluster) {
                        if let Some(opaque) = &opaque_config {
                            route.opaque_config = opaque.clone();
                        }
                        routes.push(route);
                    }
                }
            }

            let mut default_route = build_default_route(cluster);
            if let Some(opaque) = opaque_config {
                default_route.opaque_config = opaque;
            }
            routes.push(default_route);

            let mut route_config = HttpRouteConfig::new(pass.options.validate_clusters);
            route_config.virtual_hosts.push(VirtualHost {
                name: format!("inbound|{}", endpoint.port),
                domains: vec!["*".to_string()],
                routes,
            });

            let opts = HttpListenerOptions {
                mesh,
                node: pass.node,
                instances,
                payloads: env.payloads.as_ref(),
                route_config: Some(&route_config),
                ip: &endpoint.address,
                port: endpoint.port,
                rds: None,
                use_remote_address: false,
                direction: TraceOperation::Ingress,
                outbound: false,
                authn_policy: Some(&authn_policy),
            };

            if protocol == Protocol::Bolt {
                build_rpc_listener(opts)
            } else {
                build_http_listener(opts)
            }
        } else if protocol.is_tcp() {
            let route_config = TcpRouteConfig {
                routes: vec![build_tcp_route(&cluster, &[endpoint.address.clone()])],
            };
            let mut listener =
                build_tcp_listener(route_config, &endpoint.address, endpoint.port, protocol, &mut pass.diagnostics);

            if mesh.policy_enabled() {
                let filter = policy_network_filter(env.payloads.tcp_policy_filter(pass.node, instance));
                listener.filters.insert(0, filter);
            }
            listener
        } else {
            pass.diagnostics.record(
                DiagnosticKind::UnsupportedProtocol,
                format!(
                    "Unsupported inbound protocol {} for port {} of {}",
                    protocol, endpoint.service_port.port, instance.service.hostname
                ),
            );
            continue;
        };

        if let Some(mtls) = authn_policy.require_tls() {
            listener.ssl_context = Some(env.payloads.listener_tls_context(mtls));
        }
        listeners.push(listener);
    }

    Ok((listeners, clusters))
}
