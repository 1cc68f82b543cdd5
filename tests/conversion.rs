//! Envoy v3 rendering of compiled configuration

mod common;

use common::*;
use envoy_types::pb::envoy::config::cluster::v3::cluster::{ClusterDiscoveryType, DiscoveryType};
use envoy_types::pb::envoy::config::route::v3::route::Action;
use envoy_types::pb::envoy::config::route::v3::route_match::PathSpecifier;
use flowmesh::config::{CompileOptions, MeshConfig};
use flowmesh::domain::Protocol;
use flowmesh::xds::conversion::{cluster_to_any, to_envoy_cluster, to_envoy_route_configuration, CLUSTER_TYPE_URL};

#[test]
fn test_every_compiled_cluster_renders() {
    let mut registry = mesh_registry();
    registry.add_route_rule(v2_prefix_rule(BILLING));
    registry.add_egress_rule(egress_rule("google", "*.google.com", &[(443, Protocol::Https)]));
    let compiler = new_compiler(MeshConfig::default(), registry);

    let compiled = compiler.compile(&sidecar(), &CompileOptions::default()).unwrap();
    for cluster in &compiled.clusters {
        let rendered = to_envoy_cluster(cluster).unwrap();
        assert_eq!(rendered.name, cluster.name);
        assert_eq!(cluster_to_any(cluster).unwrap().type_url, CLUSTER_TYPE_URL);
    }

    let billing = to_envoy_cluster(compiled.cluster(&format!("out.{}|http", BILLING)).unwrap()).unwrap();
    assert_eq!(billing.cluster_discovery_type, Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32)));

    let egress = to_envoy_cluster(compiled.cluster("out.*.google.com|external-HTTPS-443").unwrap()).unwrap();
    assert_eq!(egress.cluster_discovery_type, Some(ClusterDiscoveryType::Type(DiscoveryType::OriginalDst as i32)));
    assert!(egress.transport_socket.is_some());
}

#[test]
fn test_route_table_renders_in_order() {
    let mut registry = mesh_registry();
    registry.add_route_rule(v2_prefix_rule(BILLING));
    let compiler = new_compiler(MeshConfig::default(), registry);

    let table = compiler.build_rds_route(&sidecar(), "8080", &CompileOptions::default()).unwrap();
    let rendered = to_envoy_route_configuration("8080", &table).unwrap();

    assert_eq!(rendered.name, "8080");
    assert_eq!(rendered.virtual_hosts.len(), 1);
    let routes = &rendered.virtual_hosts[0].routes;
    assert_eq!(routes.len(), 2);

    let prefixes: Vec<_> = routes
        .iter()
        .map(|r| match r.r#match.as_ref().and_then(|m| m.path_specifier.as_ref()) {
            Some(PathSpecifier::Prefix(prefix)) => prefix.clone(),
            other => panic!("unexpected path specifier {:?}", other),
        })
        .collect();
    assert_eq!(prefixes, vec!["/v2", "/"]);
    assert!(routes.iter().all(|r| matches!(r.action, Some(Action::Route(_)))));
}
