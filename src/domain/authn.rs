//! Authentication policy resolved per destination

use serde::{Deserialize, Serialize};

/// Mutual TLS requirement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MtlsParams {
    /// Accept plaintext alongside mutual TLS
    #[serde(default)]
    pub permissive: bool,
}

/// End-user JWT requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtParams {
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub audiences: Vec<String>,
}

/// Consolidated authentication policy; the default requires nothing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthnPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtls: Option<MtlsParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<JwtParams>,
}

impl AuthnPolicy {
    pub fn mutual_tls() -> Self {
        Self { mtls: Some(MtlsParams::default()), jwt: None }
    }

    pub fn require_tls(&self) -> Option<&MtlsParams> {
        self.mtls.as_ref()
    }

    pub fn require_jwt(&self) -> Option<&JwtParams> {
        self.jwt.as_ref()
    }

    /// Whether the authn filter has anything to enforce
    pub fn requires_authn(&self) -> bool {
        self.mtls.is_some() || self.jwt.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_requires_nothing() {
        let policy = AuthnPolicy::default();
        assert!(!policy.requires_authn());
        assert!(policy.require_tls().is_none());
    }

    #[test]
    fn test_jwt_only_policy() {
        let policy = AuthnPolicy {
            mtls: None,
            jwt: Some(JwtParams {
                issuer: "https://issuer.example.com".into(),
                jwks_uri: "https://issuer.example.com/jwks".into(),
                audiences: vec![],
            }),
        };
        assert!(policy.requires_authn());
        assert!(policy.require_tls().is_none());
        assert!(policy.require_jwt().is_some());
    }
}
