//! HTTP filter chain ordering

use flowmesh::domain::{AuthnPolicy, JwtParams};
use flowmesh::xds::filters::{
    build_filter_chain, ChainFlavor, AUTHN_FILTER, CORS_FILTER, FAULT_FILTER, JWT_FILTER, POLICY_FILTER,
    ROUTER_FILTER,
};
use flowmesh::xds::HttpFilter;
use serde_json::json;

fn jwt_policy() -> AuthnPolicy {
    AuthnPolicy {
        jwt: Some(JwtParams {
            issuer: "https://issuer.example.com".to_string(),
            jwks_uri: "https://issuer.example.com/jwks".to_string(),
            audiences: Vec::new(),
        }),
        ..AuthnPolicy::mutual_tls()
    }
}

fn faults() -> Vec<HttpFilter> {
    vec![
        HttpFilter::decoder(FAULT_FILTER, json!({ "upstream_cluster": "out.a|http" })),
        HttpFilter::decoder(FAULT_FILTER, json!({ "upstream_cluster": "out.b|http" })),
    ]
}

fn names(filters: &[HttpFilter]) -> Vec<&str> {
    filters.iter().map(|f| f.name.as_str()).collect()
}

#[test]
fn test_standard_chain_order() {
    let policy = jwt_policy();
    let filters = build_filter_chain(ChainFlavor::Standard, Some(&policy), Some(json!({})), faults());

    assert_eq!(
        names(&filters),
        vec![JWT_FILTER, AUTHN_FILTER, POLICY_FILTER, CORS_FILTER, FAULT_FILTER, FAULT_FILTER, ROUTER_FILTER]
    );
    assert_eq!(filters[4].config["upstream_cluster"], "out.a|http");
    assert_eq!(filters[5].config["upstream_cluster"], "out.b|http");
}

#[test]
fn test_rpc_chain_has_no_cors_or_router() {
    let policy = jwt_policy();
    let filters = build_filter_chain(ChainFlavor::Rpc, Some(&policy), Some(json!({})), faults());
    assert_eq!(names(&filters), vec![JWT_FILTER, POLICY_FILTER, FAULT_FILTER, FAULT_FILTER]);
}

#[test]
fn test_optional_filters_omitted() {
    let filters = build_filter_chain(ChainFlavor::Standard, Some(&AuthnPolicy::default()), None, Vec::new());
    assert_eq!(names(&filters), vec![CORS_FILTER, ROUTER_FILTER]);

    let filters = build_filter_chain(ChainFlavor::Standard, Some(&AuthnPolicy::mutual_tls()), None, Vec::new());
    assert_eq!(names(&filters), vec![AUTHN_FILTER, CORS_FILTER, ROUTER_FILTER]);
}
