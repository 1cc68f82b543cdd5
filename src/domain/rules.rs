//! Routing and egress rules
//!
//! Rules are authored outside the compiler and arrive through the rule store. The
//! helpers here give them a deterministic total order and reject conflicting egress
//! rules before any configuration is built from them.

use super::service::{Labels, Protocol};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Identity metadata shared by every rule kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_domain() -> String {
    "cluster.local".to_string()
}

impl ConfigMeta {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: namespace.into(), domain: default_domain() }
    }

    /// Ordering key, unique within one rule kind
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Fully qualified `name.namespace.domain`
    pub fn mesh_name(&self) -> String {
        format!("{}.{}.{}", self.name, self.namespace, self.domain)
    }
}

/// String predicate used by URI and header matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringMatch {
    Exact(String),
    Prefix(String),
    Regex(String),
}

/// Request match condition of a routing rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<StringMatch>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, StringMatch>,
}

/// Weighted destination of a routing rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DestinationWeight {
    /// Overrides the rule destination when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub weight: u32,
}

/// URI/authority replacement used by redirects and rewrites
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UriAuthority {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRetry {
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_try_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultDelay {
    pub percent: f32,
    pub fixed_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultAbort {
    pub percent: f32,
    pub http_status: u16,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HttpFault {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<FaultDelay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort: Option<FaultAbort>,
}

/// HTTP routing rule for one destination service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteRule {
    /// Destination hostname the rule applies to
    pub destination: String,

    /// Only traffic originating from this service hostname is affected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Higher precedence rules match first
    #[serde(default)]
    pub precedence: i32,

    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_condition: Option<MatchCondition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<DestinationWeight>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<UriAuthority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<UriAuthority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_req_timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_req_retries: Option<HttpRetry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_fault: Option<HttpFault>,

    #[serde(default)]
    pub websocket_upgrade: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub append_headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRuleConfig {
    pub meta: ConfigMeta,
    pub spec: RouteRule,
}

/// Sort by precedence (highest first), then by key
pub fn sort_route_rules(rules: &mut [RouteRuleConfig]) {
    rules.sort_by(|a, b| match b.spec.precedence.cmp(&a.spec.precedence) {
        Ordering::Equal => a.meta.key().cmp(&b.meta.key()),
        other => other,
    });
}

/// Port opened by an egress rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressPort {
    pub port: u16,
    pub protocol: Protocol,
}

/// Rule admitting traffic to a destination outside the mesh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRule {
    /// External hostname (possibly wildcarded) or CIDR
    pub destination: String,
    pub ports: Vec<EgressPort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRuleConfig {
    pub meta: ConfigMeta,
    pub spec: EgressRule,
}

/// Egress rules after conflict validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedEgressRules {
    /// Accepted rules, ordered by key
    pub accepted: Vec<EgressRuleConfig>,
    /// One message per rejected rule
    pub rejected: Vec<String>,
}

/// Keep the first rule (in key order) for each destination and reject the rest
pub fn reject_conflicting_egress_rules(mut rules: Vec<EgressRuleConfig>) -> ValidatedEgressRules {
    rules.sort_by_key(|r| r.meta.key());

    let mut owners: HashMap<String, String> = HashMap::new();
    let mut validated = ValidatedEgressRules::default();

    for rule in rules {
        let destination = rule.spec.destination.to_ascii_lowercase();
        let key = rule.meta.key();
        match owners.get(&destination) {
            Some(owner) => validated.rejected.push(format!(
                "rule {} conflicts with rule {} on destination {}",
                key, owner, rule.spec.destination
            )),
            None => {
                owners.insert(destination, key);
                validated.accepted.push(rule);
            }
        }
    }

    validated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, precedence: i32) -> RouteRuleConfig {
        RouteRuleConfig {
            meta: ConfigMeta::new(name, "default"),
            spec: RouteRule { destination: "a.default".into(), precedence, ..Default::default() },
        }
    }

    fn egress(name: &str, destination: &str) -> EgressRuleConfig {
        EgressRuleConfig {
            meta: ConfigMeta::new(name, "default"),
            spec: EgressRule {
                destination: destination.into(),
                ports: vec![EgressPort { port: 80, protocol: Protocol::Http }],
            },
        }
    }

    #[test]
    fn test_sort_route_rules() {
        let mut rules = vec![rule("c", 1), rule("b", 5), rule("a", 1)];
        sort_route_rules(&mut rules);
        let names: Vec<_> = rules.iter().map(|r| r.meta.name.clone()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);

        sort_route_rules(&mut rules);
        let again: Vec<_> = rules.iter().map(|r| r.meta.name.as_str()).collect();
        assert_eq!(names, again);
    }

    #[test]
    fn test_reject_conflicting_egress_rules() {
        let validated = reject_conflicting_egress_rules(vec![
            egress("z-google", "www.google.com"),
            egress("a-google", "WWW.google.com"),
            egress("cnn", "*.cnn.com"),
        ]);

        let accepted: Vec<_> = validated.accepted.iter().map(|r| r.meta.name.as_str()).collect();
        assert_eq!(accepted, vec!["a-google", "cnn"]);
        assert_eq!(validated.rejected.len(), 1);
        assert!(validated.rejected[0].contains("default/z-google"));
    }

    #[test]
    fn test_rule_deserialization() {
        let rule: RouteRule = serde_json::from_str(
            r#"{"destination":"billing.default","match":{"uri":{"prefix":"/v2"}},"route":[{"labels":{"version":"v2"},"weight":100}]}"#,
        )
        .unwrap();
        assert_eq!(
            rule.match_condition.and_then(|m| m.uri),
            Some(StringMatch::Prefix("/v2".into()))
        );
        assert_eq!(rule.route[0].labels.get("version").map(String::as_str), Some("v2"));
    }
}
