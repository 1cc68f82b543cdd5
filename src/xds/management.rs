//! Health and readiness probe listeners
//!
//! Management ports are forwarded as plain TCP to the local endpoint regardless of the
//! declared protocol. They carry no policy filter and no authentication so probes keep
//! working before the workload is registered with the mesh.

use super::cluster::{build_inbound_cluster, Cluster};
use super::compiler::CompilePass;
use super::diagnostics::DiagnosticKind;
use super::listener::{build_tcp_listener, Listener};
use super::route::{build_tcp_route, TcpRouteConfig};
use crate::domain::{Port, Protocol};

fn is_supported(protocol: Protocol) -> bool {
    matches!(
        protocol,
        Protocol::Http
            | Protocol::Http2
            | Protocol::Grpc
            | Protocol::Tcp
            | Protocol::Https
            | Protocol::Mongo
            | Protocol::Redis
    )
}

/// One TCP listener per management port bound to `ip`, plus its static cluster
pub fn build_management_listeners(
    pass: &mut CompilePass<'_>,
    ports: &[Port],
    ip: &str,
) -> (Vec<Listener>, Vec<Cluster>) {
    let timeout = pass.connect_timeout_ms();
    let mut listeners = Vec::with_capacity(ports.len());
    let mut clusters = Vec::with_capacity(ports.len());

    for port in ports {
        if !is_supported(port.protocol) {
            pass.diagnostics.record(
                DiagnosticKind::UnsupportedProtocol,
                format!("Unsupported protocol {} for management port {} ({})", port.protocol, port.port, port.name),
            );
            continue;
        }

        let cluster = build_inbound_cluster(port.port, Protocol::Tcp, timeout);
        let route_config = TcpRouteConfig { routes: vec![build_tcp_route(&cluster, &[ip.to_string()])] };
        listeners.push(build_tcp_listener(route_config, ip, port.port, Protocol::Tcp, &mut pass.diagnostics));
        clusters.push(cluster);
    }

    (listeners, clusters)
}
