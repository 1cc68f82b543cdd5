//! Collaborators consumed by the compiler
//!
//! Discovery, rule storage, authentication policy and payload construction live
//! outside the compiler. Each is a trait object so tests and the command line tool can
//! plug in the in-memory registry while a server plugs in live backends.

use super::cluster::SslContext;
use super::filters::HttpFilter;
use super::route::HeaderMatcher;
use crate::config::MeshConfig;
use crate::domain::{
    AuthnPolicy, HttpFault, MtlsParams, Port, Proxy, RouteRuleConfig, Service, ServiceInstance,
    ValidatedEgressRules,
};
use crate::errors::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Service and instance enumeration
pub trait ServiceDiscovery: Send + Sync {
    /// All registered services
    fn services(&self) -> Result<Vec<Service>>;

    /// Instances co-located with `node`
    fn proxy_service_instances(&self, node: &Proxy) -> Result<Vec<ServiceInstance>>;

    /// Health/readiness ports exposed at `ip`
    fn management_ports(&self, ip: &str) -> Result<Vec<Port>>;
}

/// Routing and egress rule storage
pub trait ConfigStore: Send + Sync {
    /// Rules for `destination` applicable to traffic from `instances`
    fn route_rules(&self, instances: &[ServiceInstance], destination: &str) -> Result<Vec<RouteRuleConfig>>;

    /// Rules whose destination is one of `instances`
    fn route_rules_by_destination(&self, instances: &[ServiceInstance]) -> Result<Vec<RouteRuleConfig>>;

    /// Egress rules after conflict validation, ordered by key
    fn egress_rules(&self) -> Result<ValidatedEgressRules>;
}

/// Authentication requirements of a destination
pub trait AuthnPolicyResolver: Send + Sync {
    fn resolve(&self, hostname: &str, port: &Port) -> AuthnPolicy;
}

/// Builders for payloads the compiler attaches without interpreting
pub trait PayloadBuilder: Send + Sync {
    /// Server-side TLS context for a listener requiring mutual TLS
    fn listener_tls_context(&self, params: &MtlsParams) -> SslContext;

    /// Policy/telemetry HTTP filter configuration
    fn http_policy_filter(&self, node: &Proxy, instances: &[ServiceInstance], outbound: bool) -> Value;

    /// Policy/telemetry network filter configuration for an inbound TCP endpoint
    fn tcp_policy_filter(&self, node: &Proxy, instance: &ServiceInstance) -> Value;

    /// Per-route policy attributes for traffic to `destination`
    fn route_policy_config(
        &self,
        node: &Proxy,
        destination: &str,
        instances: &[ServiceInstance],
        outbound: bool,
    ) -> BTreeMap<String, String>;

    /// Fault injection filter scoped to one upstream cluster
    fn fault_filter(&self, fault: &HttpFault, cluster_name: &str, headers: &[HeaderMatcher]) -> Option<HttpFilter>;
}

/// Everything one compilation pass reads
#[derive(Clone)]
pub struct Environment {
    pub mesh: MeshConfig,
    pub discovery: Arc<dyn ServiceDiscovery>,
    pub config_store: Arc<dyn ConfigStore>,
    pub authn: Arc<dyn AuthnPolicyResolver>,
    pub payloads: Arc<dyn PayloadBuilder>,
}

impl Environment {
    /// Environment with the stock authn resolver (no requirements) and payload builders
    pub fn new(
        mesh: MeshConfig,
        discovery: Arc<dyn ServiceDiscovery>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Self {
        let payloads = Arc::new(crate::registry::StandardPayloads::new(mesh.clone()));
        Self {
            mesh,
            discovery,
            config_store,
            authn: Arc::new(crate::registry::StaticAuthnResolver::default()),
            payloads,
        }
    }

    pub fn with_authn(mut self, authn: Arc<dyn AuthnPolicyResolver>) -> Self {
        self.authn = authn;
        self
    }

    pub fn with_payloads(mut self, payloads: Arc<dyn PayloadBuilder>) -> Self {
        self.payloads = payloads;
        self
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment").field("mesh", &self.mesh).finish_non_exhaustive()
    }
}
