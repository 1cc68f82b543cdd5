//! In-memory collaborators
//!
//! [`MemoryRegistry`] answers discovery and rule-store queries from a static snapshot,
//! which is what the command line tool loads and what tests build by hand.
//! [`StaticAuthnResolver`] and [`StandardPayloads`] are the stock authentication and
//! payload collaborators.

use crate::config::MeshConfig;
use crate::domain::{
    reject_conflicting_egress_rules, AuthnPolicy, EgressRuleConfig, HttpFault, Labels, MtlsParams,
    NetworkEndpoint, Port, Proxy, RouteRuleConfig, Service, ServiceInstance, ValidatedEgressRules,
};
use crate::errors::{Error, Result};
use crate::xds::cluster::SslContext;
use crate::xds::filters::{HttpFilter, FAULT_FILTER};
use crate::xds::plugins::{AuthnPolicyResolver, ConfigStore, PayloadBuilder, ServiceDiscovery};
use crate::xds::route::HeaderMatcher;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Instance record of a snapshot, pointing at its service by hostname and port name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub hostname: String,
    pub port_name: String,
    pub address: String,
    /// Endpoint port; defaults to the service port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_port: Option<u16>,
    #[serde(default)]
    pub labels: Labels,
}

/// Serializable registry contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    /// Management ports keyed by node IP
    #[serde(default)]
    pub management_ports: BTreeMap<String, Vec<Port>>,
    #[serde(default)]
    pub route_rules: Vec<RouteRuleConfig>,
    #[serde(default)]
    pub egress_rules: Vec<EgressRuleConfig>,
    /// Authentication policies keyed by destination hostname
    #[serde(default)]
    pub authn_policies: BTreeMap<String, AuthnPolicy>,
}

/// Discovery and rule store backed by a snapshot
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    snapshot: RegistrySnapshot,
    discovery_failure: Option<String>,
    rule_store_failure: Option<String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self { snapshot, ..Default::default() }
    }

    /// Load a YAML or JSON snapshot file
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: RegistrySnapshot = serde_yaml::from_str(&raw).map_err(|e| {
            Error::config_with_source(format!("Failed to parse registry snapshot {}", path.display()), Box::new(e))
        })?;

        debug!(
            path = %path.display(),
            services = snapshot.services.len(),
            instances = snapshot.instances.len(),
            route_rules = snapshot.route_rules.len(),
            egress_rules = snapshot.egress_rules.len(),
            "Loaded registry snapshot"
        );

        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> &RegistrySnapshot {
        &self.snapshot
    }

    pub fn add_service(&mut self, service: Service) {
        self.snapshot.services.push(service);
    }

    pub fn add_instance(&mut self, record: InstanceRecord) {
        self.snapshot.instances.push(record);
    }

    pub fn add_management_port(&mut self, ip: impl Into<String>, port: Port) {
        self.snapshot.management_ports.entry(ip.into()).or_default().push(port);
    }

    pub fn add_route_rule(&mut self, rule: RouteRuleConfig) {
        self.snapshot.route_rules.push(rule);
    }

    pub fn add_egress_rule(&mut self, rule: EgressRuleConfig) {
        self.snapshot.egress_rules.push(rule);
    }

    /// Make every discovery call fail with `message`
    pub fn fail_discovery(&mut self, message: impl Into<String>) {
        self.discovery_failure = Some(message.into());
    }

    /// Make every rule-store call fail with `message`
    pub fn fail_rules(&mut self, message: impl Into<String>) {
        self.rule_store_failure = Some(message.into());
    }

    /// Authentication resolver over the snapshot's policies
    pub fn authn_resolver(&self) -> StaticAuthnResolver {
        StaticAuthnResolver { policies: self.snapshot.authn_policies.clone() }
    }

    fn check_discovery(&self) -> Result<()> {
        match &self.discovery_failure {
            Some(message) => Err(Error::discovery(message.clone())),
            None => Ok(()),
        }
    }

    fn check_rule_store(&self) -> Result<()> {
        match &self.rule_store_failure {
            Some(message) => Err(Error::rule_store(message.clone())),
            None => Ok(()),
        }
    }

    fn resolve_instance(&self, record: &InstanceRecord) -> Result<ServiceInstance> {
        let service = self
            .snapshot
            .services
            .iter()
            .find(|s| s.hostname == record.hostname)
            .ok_or_else(|| Error::discovery(format!("Instance {} references unknown service {}", record.address, record.hostname)))?;
        let port = service.port_by_name(&record.port_name).ok_or_else(|| {
            Error::discovery(format!("Service {} has no port named '{}'", record.hostname, record.port_name))
        })?;

        Ok(ServiceInstance {
            endpoint: NetworkEndpoint {
                address: record.address.clone(),
                port: record.endpoint_port.unwrap_or(port.port),
                service_port: port.clone(),
            },
            service: service.clone(),
            labels: record.labels.clone(),
        })
    }
}

impl ServiceDiscovery for MemoryRegistry {
    fn services(&self) -> Result<Vec<Service>> {
        self.check_discovery()?;
        Ok(self.snapshot.services.clone())
    }

    fn proxy_service_instances(&self, node: &Proxy) -> Result<Vec<ServiceInstance>> {
        self.check_discovery()?;
        self.snapshot
            .instances
            .iter()
            .filter(|record| record.address == node.ip_address)
            .map(|record| self.resolve_instance(record))
            .collect()
    }

    fn management_ports(&self, ip: &str) -> Result<Vec<Port>> {
        self.check_discovery()?;
        Ok(self.snapshot.management_ports.get(ip).cloned().unwrap_or_default())
    }
}

impl ConfigStore for MemoryRegistry {
    fn route_rules(&self, instances: &[ServiceInstance], destination: &str) -> Result<Vec<RouteRuleConfig>> {
        self.check_rule_store()?;
        let sources: HashSet<&str> = instances.iter().map(|i| i.service.hostname.as_str()).collect();

        Ok(self
            .snapshot
            .route_rules
            .iter()
            .filter(|rule| rule.spec.destination == destination)
            .filter(|rule| rule.spec.source.as_deref().map_or(true, |source| sources.contains(source)))
            .cloned()
            .collect())
    }

    fn route_rules_by_destination(&self, instances: &[ServiceInstance]) -> Result<Vec<RouteRuleConfig>> {
        self.check_rule_store()?;
        let destinations: HashSet<&str> = instances.iter().map(|i| i.service.hostname.as_str()).collect();

        Ok(self
            .snapshot
            .route_rules
            .iter()
            .filter(|rule| destinations.contains(rule.spec.destination.as_str()))
            .cloned()
            .collect())
    }

    fn egress_rules(&self) -> Result<ValidatedEgressRules> {
        self.check_rule_store()?;
        Ok(reject_conflicting_egress_rules(self.snapshot.egress_rules.clone()))
    }
}

/// Per-hostname authentication policies; unknown hostnames require nothing
#[derive(Debug, Clone, Default)]
pub struct StaticAuthnResolver {
    policies: BTreeMap<String, AuthnPolicy>,
}

impl StaticAuthnResolver {
    pub fn with_policy(mut self, hostname: impl Into<String>, policy: AuthnPolicy) -> Self {
        self.policies.insert(hostname.into(), policy);
        self
    }
}

impl AuthnPolicyResolver for StaticAuthnResolver {
    fn resolve(&self, hostname: &str, _port: &Port) -> AuthnPolicy {
        self.policies.get(hostname).cloned().unwrap_or_default()
    }
}

/// Policy, telemetry, fault and TLS payloads derived from mesh settings
#[derive(Debug, Clone)]
pub struct StandardPayloads {
    mesh: MeshConfig,
}

impl StandardPayloads {
    pub fn new(mesh: MeshConfig) -> Self {
        Self { mesh }
    }

    fn node_uid(node: &Proxy) -> String {
        format!("kubernetes://{}", node.id)
    }

    fn transport(&self) -> Value {
        json!({
            "check_cluster": self.mesh.mixer_check_server.clone().unwrap_or_default(),
            "report_cluster": self.mesh.mixer_report_server.clone().unwrap_or_default(),
        })
    }
}

impl PayloadBuilder for StandardPayloads {
    fn listener_tls_context(&self, params: &MtlsParams) -> SslContext {
        let mut context = SslContext::from_certs_path(&self.mesh.auth_certs_path, Vec::new());
        context.require_client_certificate = Some(!params.permissive);
        context
    }

    fn http_policy_filter(&self, node: &Proxy, instances: &[ServiceInstance], outbound: bool) -> Value {
        let uid = Self::node_uid(node);
        let mut config = json!({
            "transport": self.transport(),
            "disable_check": self.mesh.disable_policy_checks,
        });

        if outbound {
            config["forward_attributes"] = json!({ "source.uid": uid });
        } else {
            let services: Vec<&str> = instances.iter().map(|i| i.service.hostname.as_str()).collect();
            config["mixer_attributes"] = json!({
                "destination.uid": uid,
                "destination.ip": node.ip_address,
                "destination.services": services,
            });
        }

        config
    }

    fn tcp_policy_filter(&self, node: &Proxy, instance: &ServiceInstance) -> Value {
        json!({
            "transport": self.transport(),
            "disable_check": self.mesh.disable_policy_checks,
            "mixer_attributes": {
                "destination.uid": Self::node_uid(node),
                "destination.ip": instance.endpoint.address,
                "destination.port": instance.endpoint.port,
                "destination.service": instance.service.hostname,
            },
        })
    }

    fn route_policy_config(
        &self,
        _node: &Proxy,
        destination: &str,
        _instances: &[ServiceInstance],
        outbound: bool,
    ) -> BTreeMap<String, String> {
        let on_off = |enabled: bool| (if enabled { "on" } else { "off" }).to_string();

        let mut config = BTreeMap::new();
        config.insert("mixer_control".to_string(), on_off(true));
        config.insert("mixer_check".to_string(), on_off(!self.mesh.disable_policy_checks));
        config.insert("mixer_forward".to_string(), on_off(outbound));
        config.insert("destination.service".to_string(), destination.to_string());
        config
    }

    fn fault_filter(&self, fault: &HttpFault, cluster_name: &str, headers: &[HeaderMatcher]) -> Option<HttpFilter> {
        if fault.delay.is_none() && fault.abort.is_none() {
            return None;
        }

        let mut config = json!({ "upstream_cluster": cluster_name });
        if let Some(abort) = &fault.abort {
            config["abort"] = json!({ "percent": abort.percent, "http_status": abort.http_status });
        }
        if let Some(delay) = &fault.delay {
            config["delay"] = json!({
                "type": "fixed",
                "percent": delay.percent,
                "fixed_duration": delay.fixed_delay_ms,
            });
        }
        if !headers.is_empty() {
            config["headers"] = serde_json::to_value(headers).unwrap_or(Value::Null);
        }

        Some(HttpFilter::decoder(FAULT_FILTER, config))
    }
}
