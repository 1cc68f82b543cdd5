//! Compiler entrypoints
//!
//! [`ConfigCompiler`] turns one snapshot of mesh state into the listeners and clusters
//! of a single proxy node, or into one route table for a route discovery request.
//! Every call allocates its own [`CompilePass`]; nothing is shared between calls except
//! the read-only [`Environment`].

use super::cluster::{control_plane_clusters, normalize_clusters, Cluster, ClusterCache};
use super::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use super::egress::build_egress_http_routes;
use super::inbound::build_inbound_listeners;
use super::listener::{
    build_http_listener, find_by_address, normalize_listeners, HttpListenerOptions, Listener,
    TraceOperation,
};
use super::management::build_management_listeners;
use super::outbound::{build_outbound_listeners, build_outbound_route_tables};
use super::plugins::Environment;
use super::route::{HttpRouteConfig, HttpRouteConfigs, RDS_ALL};
use crate::compile_span;
use crate::config::CompileOptions;
use crate::domain::{EgressRuleConfig, NodeRole, Proxy, Service, ServiceInstance, LOCALHOST_ADDRESS, WILDCARD_ADDRESS};
use crate::errors::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

/// Listeners, clusters and diagnostics for one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledConfig {
    pub listeners: Vec<Listener>,
    pub clusters: Vec<Cluster>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledConfig {
    pub fn listener(&self, name: &str) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.name == name)
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }
}

/// Working state of one compilation pass
pub struct CompilePass<'a> {
    pub env: &'a Environment,
    pub node: &'a Proxy,
    pub options: CompileOptions,
    pub clusters: ClusterCache,
    pub diagnostics: Diagnostics,
    egress_rules: Option<Vec<EgressRuleConfig>>,
    wildcard_ports: BTreeSet<u16>,
}

impl<'a> CompilePass<'a> {
    pub fn new(env: &'a Environment, node: &'a Proxy, options: CompileOptions) -> Self {
        Self {
            env,
            node,
            options,
            clusters: ClusterCache::new(),
            diagnostics: Diagnostics::new(),
            egress_rules: None,
            wildcard_ports: BTreeSet::new(),
        }
    }

    pub fn connect_timeout_ms(&self) -> u64 {
        self.env.mesh.connect_timeout_ms
    }

    /// Claim the wildcard TCP listener on `port`; false when an earlier listener holds it
    pub fn claim_wildcard_port(&mut self, port: u16) -> bool {
        self.wildcard_ports.insert(port)
    }

    /// Accepted egress rules, fetched once per pass; rejections are recorded once
    pub fn egress_rules(&mut self) -> Result<Vec<EgressRuleConfig>> {
        if let Some(rules) = &self.egress_rules {
            return Ok(rules.clone());
        }

        let validated = self.env.config_store.egress_rules()?;
        for rejection in &validated.rejected {
            self.diagnostics.record(DiagnosticKind::RejectedEgressRule, format!("Rejected egress rule: {}", rejection));
        }

        self.egress_rules = Some(validated.accepted.clone());
        Ok(validated.accepted)
    }

    /// Outbound HTTP route tables merged with egress HTTP virtual hosts
    pub fn http_route_tables(
        &mut self,
        services: &[Service],
        instances: &[ServiceInstance],
    ) -> Result<HttpRouteConfigs> {
        let mut tables = build_outbound_route_tables(self, services, instances)?;
        build_egress_http_routes(self, instances, &mut tables)?;
        Ok(tables)
    }
}

/// Proxy configuration compiler
#[derive(Debug, Clone)]
pub struct ConfigCompiler {
    env: Environment,
}

impl ConfigCompiler {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Listeners and clusters for `node`
    pub fn compile(&self, node: &Proxy, options: &CompileOptions) -> Result<CompiledConfig> {
        let span = compile_span!("compile", node.service_node(), role = %node.role);
        let _enter = span.enter();

        let mesh = &self.env.mesh;
        let mut pass = CompilePass::new(&self.env, node, *options);
        let mut listeners: Vec<Listener> = Vec::new();
        let mut clusters: Vec<Cluster> = Vec::new();

        if node.role == NodeRole::Management {
            let ports = self.env.discovery.management_ports(&node.ip_address)?;
            let (mgmt_listeners, mgmt_clusters) =
                build_management_listeners(&mut pass, &ports, &node.ip_address);
            listeners.extend(mgmt_listeners);
            clusters.extend(mgmt_clusters);
        } else {
            let instances = self.env.discovery.proxy_service_instances(node)?;
            let mut services = self.env.discovery.services()?;
            services.sort_by(|a, b| a.hostname.cmp(&b.hostname));

            let mut tables: Option<HttpRouteConfigs> = None;

            if node.role.is_gateway() {
                let route_tables = pass.http_route_tables(&services, &instances)?;
                let (outbound, outbound_clusters) =
                    build_outbound_listeners(&mut pass, &services, &instances, &route_tables)?;
                listeners.extend(outbound);
                clusters.extend(outbound_clusters);
                tables = Some(route_tables);

                if mesh.capture_enabled() {
                    listeners.push(Listener::virtual_listener(mesh.proxy_listen_port));
                }
            } else if mesh.capture_enabled() {
                let (inbound, inbound_clusters) = build_inbound_listeners(&mut pass, &instances)?;
                let route_tables = pass.http_route_tables(&services, &instances)?;
                let (outbound, outbound_clusters) =
                    build_outbound_listeners(&mut pass, &services, &instances, &route_tables)?;
                tables = Some(route_tables);

                let ports = self.env.discovery.management_ports(&node.ip_address)?;
                let (mgmt_listeners, mgmt_clusters) =
                    build_management_listeners(&mut pass, &ports, &node.ip_address);

                listeners.extend(inbound);
                listeners.extend(outbound);
                clusters.extend(inbound_clusters);
                clusters.extend(outbound_clusters);

                // a management port shared with a service listener would break health probes
                for (listener, cluster) in mgmt_listeners.into_iter().zip(mgmt_clusters) {
                    if let Some(existing) = find_by_address(&listeners, &listener.address) {
                        pass.diagnostics.record(
                            DiagnosticKind::ManagementCollision,
                            format!(
                                "Omitting listener for management address {} ({}) due to collision with service listener {} ({})",
                                listener.name, listener.address, existing.name, existing.address
                            ),
                        );
                        continue;
                    }
                    listeners.push(listener);
                    clusters.push(cluster);
                }

                for listener in &mut listeners {
                    listener.bind_to_port = false;
                }
                listeners.push(Listener::virtual_listener(mesh.proxy_listen_port));
            }

            if mesh.proxy_http_port > 0 {
                let route_tables = match tables {
                    Some(tables) => tables,
                    None => pass.http_route_tables(&services, &instances)?,
                };
                clusters.extend(route_tables.clusters());
                listeners.push(self.http_proxy_listener(&pass, node, &instances));
            }
        }

        let mut diagnostics = std::mem::take(&mut pass.diagnostics);
        let listeners = normalize_listeners(listeners, &mut diagnostics);
        let clusters = normalize_clusters(clusters, &mut diagnostics);

        info!(
            node_id = %node.service_node(),
            role = %node.role,
            listeners = listeners.len(),
            clusters = clusters.len(),
            diagnostics = diagnostics.entries().len(),
            "Compiled proxy configuration"
        );

        Ok(CompiledConfig { listeners, clusters, diagnostics: diagnostics.into_vec() })
    }

    /// Listener for explicitly proxied HTTP traffic, served from the all-routes table
    fn http_proxy_listener(&self, pass: &CompilePass<'_>, node: &Proxy, instances: &[ServiceInstance]) -> Listener {
        let gateway = node.role.is_gateway();
        build_http_listener(HttpListenerOptions {
            mesh: &self.env.mesh,
            node,
            instances,
            payloads: pass.env.payloads.as_ref(),
            route_config: None,
            ip: if gateway { WILDCARD_ADDRESS } else { LOCALHOST_ADDRESS },
            port: self.env.mesh.proxy_http_port,
            rds: Some(RDS_ALL.to_string()),
            use_remote_address: gateway,
            direction: if gateway { TraceOperation::Ingress } else { TraceOperation::Egress },
            outbound: true,
            authn_policy: None,
        })
    }

    /// Route table named `route_name`: a port number, or `*` for every port
    pub fn build_rds_route(
        &self,
        node: &Proxy,
        route_name: &str,
        options: &CompileOptions,
    ) -> Result<HttpRouteConfig> {
        let span = compile_span!("rds", node.service_node(), route = %route_name);
        let _enter = span.enter();

        if node.role == NodeRole::Management {
            return Err(Error::unsupported_role("route discovery", node.role));
        }

        let port = if route_name == RDS_ALL {
            None
        } else {
            Some(route_name.parse::<u16>().map_err(|_| Error::InvalidRouteName(route_name.to_string()))?)
        };

        let instances = self.env.discovery.proxy_service_instances(node)?;
        let mut services = self.env.discovery.services()?;
        services.sort_by(|a, b| a.hostname.cmp(&b.hostname));

        let mut pass = CompilePass::new(&self.env, node, *options);
        let mut tables = pass.http_route_tables(&services, &instances)?;

        let config = match port {
            None => tables.combine(&mut pass.diagnostics),
            Some(port) => tables.remove(port).unwrap_or_else(|| HttpRouteConfig::new(options.validate_clusters)),
        };

        tracing::debug!(
            route = %route_name,
            virtual_hosts = config.virtual_hosts.len(),
            "Built route table"
        );

        Ok(config)
    }

    /// Discovery and tracing clusters every proxy bootstraps with
    pub fn control_plane_clusters(&self) -> Vec<Cluster> {
        control_plane_clusters(&self.env.mesh)
    }
}
