//! Compiling from a registry snapshot file, the way the command line tool does

mod common;

use common::new_compiler;
use flowmesh::config::{CompileOptions, MeshConfig};
use flowmesh::domain::{NodeRole, Proxy};
use flowmesh::registry::MemoryRegistry;

const SNAPSHOT: &str = r#"
services:
  - hostname: billing.default.svc.cluster.local
    address: 10.1.0.10
    ports:
      - name: http
        port: 8080
        protocol: HTTP
  - hostname: payments.example.com
    external: true
    ports:
      - name: https
        port: 443
        protocol: HTTPS
instances:
  - hostname: billing.default.svc.cluster.local
    port_name: http
    address: 10.0.0.5
    endpoint_port: 18080
    labels:
      version: v1
route_rules:
  - meta:
      name: billing-v2
    spec:
      destination: billing.default.svc.cluster.local
      precedence: 1
      match:
        uri:
          prefix: /v2
      route:
        - labels:
            version: v2
          weight: 100
authn_policies:
  billing.default.svc.cluster.local:
    mtls:
      permissive: true
"#;

fn load() -> MemoryRegistry {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.yaml");
    std::fs::write(&path, SNAPSHOT).unwrap();
    MemoryRegistry::from_path(&path).unwrap()
}

fn node() -> Proxy {
    Proxy::new(NodeRole::Sidecar, "billing-v1.default", "default.svc.cluster.local", "10.0.0.5")
}

#[test]
fn test_snapshot_compiles() {
    let compiler = new_compiler(MeshConfig::default(), load());
    let compiled = compiler.compile(&node(), &CompileOptions::default()).unwrap();

    // inbound listener on the endpoint port, terminating permissive mutual TLS
    let inbound = compiled.listener("http_10.0.0.5_18080").unwrap();
    assert_eq!(inbound.ssl_context.as_ref().unwrap().require_client_certificate, Some(false));
    assert!(compiled.cluster("in.18080").is_some());

    assert!(compiled.cluster("out.billing.default.svc.cluster.local|http|version=v2").is_some());
    assert!(compiled.cluster("out.billing.default.svc.cluster.local|http").is_some());
}

#[test]
fn test_external_https_service_gets_tls_origination() {
    let compiler = new_compiler(MeshConfig::default(), load());
    let table = compiler.build_rds_route(&node(), "443", &CompileOptions::default()).unwrap();

    let host = &table.virtual_hosts[0];
    assert_eq!(host.name, "payments.example.com|https");
    let cluster = &host.routes[0].clusters[0];
    assert_eq!(cluster.name, "out.payments.example.com|https");
    assert_eq!(cluster.hosts[0].url, "tcp://payments.example.com:443");
    assert!(cluster.ssl_context.is_some());
}

#[test]
fn test_malformed_snapshot_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.yaml");
    std::fs::write(&path, "services: [").unwrap();

    let error = MemoryRegistry::from_path(&path).unwrap_err();
    assert!(matches!(error, flowmesh::Error::Config { .. }));
}
