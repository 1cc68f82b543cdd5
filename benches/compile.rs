use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flowmesh::config::{CompileOptions, MeshConfig};
use flowmesh::domain::{
    ConfigMeta, MatchCondition, NodeRole, Port, Protocol, Proxy, RouteRule, RouteRuleConfig, Service, StringMatch,
};
use flowmesh::registry::{InstanceRecord, MemoryRegistry};
use flowmesh::xds::{ConfigCompiler, Environment, RDS_ALL};
use std::sync::Arc;

/// Mesh with `count` HTTP services, a TCP port each and one prefix rule per service
fn seed_registry(count: usize) -> MemoryRegistry {
    let mut registry = MemoryRegistry::new();

    for i in 0..count {
        let hostname = format!("svc-{}.default.svc.cluster.local", i);
        let mut service = Service::new(
            hostname.clone(),
            vec![
                Port::new("http", 8000 + (i % 50) as u16, Protocol::Http),
                Port::new("tcp", 9000 + (i % 50) as u16, Protocol::Tcp),
            ],
        );
        service.address = Some(format!("10.1.{}.{}", i / 250, i % 250 + 1));
        registry.add_service(service);

        registry.add_route_rule(RouteRuleConfig {
            meta: ConfigMeta::new(format!("rule-{}", i), "default"),
            spec: RouteRule {
                destination: hostname,
                precedence: 1,
                match_condition: Some(MatchCondition {
                    uri: Some(StringMatch::Prefix("/v2".to_string())),
                    ..Default::default()
                }),
                ..Default::default()
            },
        });
    }

    registry.add_instance(InstanceRecord {
        hostname: "svc-0.default.svc.cluster.local".to_string(),
        port_name: "http".to_string(),
        address: "10.0.0.5".to_string(),
        endpoint_port: None,
        labels: Default::default(),
    });

    registry
}

fn build_compiler(count: usize) -> ConfigCompiler {
    let registry = Arc::new(seed_registry(count));
    ConfigCompiler::new(Environment::new(MeshConfig::default(), registry.clone(), registry))
}

fn bench_compile(c: &mut Criterion) {
    let node = Proxy::new(NodeRole::Sidecar, "svc-0-v1.default", "default.svc.cluster.local", "10.0.0.5");
    let options = CompileOptions::default();

    let mut group = c.benchmark_group("compile_sidecar");
    for count in [10usize, 100, 500] {
        let compiler = build_compiler(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| compiler.compile(black_box(&node), &options).unwrap());
        });
    }
    group.finish();

    let mut group = c.benchmark_group("rds_all");
    for count in [10usize, 100, 500] {
        let compiler = build_compiler(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| compiler.build_rds_route(black_box(&node), RDS_ALL, &options).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
