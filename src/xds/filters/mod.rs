//! HTTP filter chains
//!
//! Filters run in the order given, so the chain layout is part of the contract with
//! the proxy:
//!
//! - **Standard**: JWT auth, authn, policy, CORS, fault injection, router
//! - **RPC** (BOLT): JWT auth, policy, fault injection
//!
//! Optional filters are left out when nothing enables them. Payloads for the policy
//! and fault filters come from the [`PayloadBuilder`](super::plugins::PayloadBuilder)
//! collaborator and are not interpreted here.

use super::route::HttpRouteConfig;
use crate::domain::AuthnPolicy;
use serde::Serialize;
use serde_json::{json, Value};

pub const ROUTER_FILTER: &str = "router";
pub const CORS_FILTER: &str = "cors";
pub const POLICY_FILTER: &str = "mixer";
pub const JWT_FILTER: &str = "jwt-auth";
pub const AUTHN_FILTER: &str = "istio_authn";
pub const FAULT_FILTER: &str = "fault";

/// Direction an HTTP filter acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Decoder,
    Encoder,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpFilter {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub name: String,
    pub config: Value,
}

impl HttpFilter {
    pub fn decoder(name: impl Into<String>, config: Value) -> Self {
        Self { filter_type: FilterType::Decoder, name: name.into(), config }
    }
}

/// Listener flavor selecting the chain layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFlavor {
    Standard,
    Rpc,
}

fn jwt_filter(policy: Option<&AuthnPolicy>) -> Option<HttpFilter> {
    let jwt = policy?.require_jwt()?;
    Some(HttpFilter::decoder(
        JWT_FILTER,
        json!({
            "rules": [{
                "issuer": jwt.issuer,
                "audiences": jwt.audiences,
                "jwks_uri": jwt.jwks_uri,
                "forward_payload_header": "flowmesh-sec-jwt-payload",
            }],
        }),
    ))
}

fn authn_filter(policy: Option<&AuthnPolicy>) -> Option<HttpFilter> {
    let policy = policy.filter(|p| p.requires_authn())?;
    Some(HttpFilter::decoder(
        AUTHN_FILTER,
        json!({ "policy": { "mtls": policy.mtls.is_some(), "jwt": policy.jwt.is_some() } }),
    ))
}

/// Fault filters carried by the table's routes, in route order
pub fn fault_filters(route_config: Option<&HttpRouteConfig>) -> Vec<HttpFilter> {
    route_config
        .map(|config| {
            config
                .virtual_hosts
                .iter()
                .flat_map(|host| host.routes.iter())
                .flat_map(|route| route.faults.iter().cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// Assemble the ordered filter list for an HTTP connection manager
pub fn build_filter_chain(
    flavor: ChainFlavor,
    authn_policy: Option<&AuthnPolicy>,
    policy_filter: Option<Value>,
    faults: Vec<HttpFilter>,
) -> Vec<HttpFilter> {
    let mut filters = Vec::with_capacity(faults.len() + 5);

    filters.extend(jwt_filter(authn_policy));
    if flavor == ChainFlavor::Standard {
        filters.extend(authn_filter(authn_policy));
    }
    if let Some(config) = policy_filter {
        filters.push(HttpFilter::decoder(POLICY_FILTER, config));
    }
    if flavor == ChainFlavor::Standard {
        filters.push(HttpFilter::decoder(CORS_FILTER, json!({})));
    }

    filters.extend(faults);

    if flavor == ChainFlavor::Standard {
        filters.push(HttpFilter::decoder(ROUTER_FILTER, json!({})));
    }

    filters
}
