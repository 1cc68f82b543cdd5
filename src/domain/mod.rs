//! Domain layer
//!
//! Input model of the compiler: services and their instances, the requesting proxy
//! node, user-authored routing/egress rules and resolved authentication policy. Every
//! type is a plain value deserializable from a registry snapshot.

pub mod authn;
pub mod proxy;
pub mod rules;
pub mod service;

pub use authn::{AuthnPolicy, JwtParams, MtlsParams};
pub use proxy::{NodeRole, Proxy};
pub use rules::{
    reject_conflicting_egress_rules, sort_route_rules, ConfigMeta, DestinationWeight,
    EgressPort, EgressRule, EgressRuleConfig, FaultAbort, FaultDelay, HttpFault, HttpRetry,
    MatchCondition, RouteRule, RouteRuleConfig, StringMatch, UriAuthority, ValidatedEgressRules,
};
pub use service::{
    labels_to_string, service_key, Labels, NetworkEndpoint, Port, Protocol, Service,
    ServiceInstance, LOCALHOST_ADDRESS, WILDCARD_ADDRESS,
};
