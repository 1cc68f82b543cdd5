//! # Configuration Settings
//!
//! Defines the mesh-wide policy consumed by the compiler, the per-call compile options,
//! and the observability settings of the command line tool.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level settings loaded from defaults, an optional file and the environment
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Mesh-wide policy
    #[validate(nested)]
    pub mesh: MeshConfig,

    /// Compile options applied to every entrypoint call
    pub compile: CompileOptions,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.mesh.validate_custom()?;
        Ok(())
    }
}

/// Authentication policy for connections to the control plane itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlPlaneAuthPolicy {
    #[default]
    None,
    MutualTls,
}

/// Mesh-wide policy shared by every compilation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MeshConfig {
    /// Port receiving redirected traffic (0 = no traffic capture)
    pub proxy_listen_port: u16,

    /// Port of the HTTP proxy listener (0 = disabled)
    pub proxy_http_port: u16,

    /// Upstream connect timeout in milliseconds
    #[validate(range(min = 1, message = "Connect timeout must be at least 1ms"))]
    pub connect_timeout_ms: u64,

    /// Route discovery refresh delay in milliseconds
    #[validate(range(min = 1, message = "RDS refresh delay must be at least 1ms"))]
    pub rds_refresh_delay_ms: u64,

    /// Discovery service address (host:port)
    #[validate(length(min = 1, message = "Discovery address cannot be empty"))]
    pub discovery_address: String,

    /// Policy check backend (host:port)
    pub mixer_check_server: Option<String>,

    /// Telemetry report backend (host:port)
    pub mixer_report_server: Option<String>,

    /// Keep telemetry but skip policy checks
    pub disable_policy_checks: bool,

    /// Access log path for HTTP listeners
    pub access_log_file: Option<String>,

    /// Enable request tracing on HTTP listeners
    pub enable_tracing: bool,

    /// Tracing collector address (host:port)
    pub zipkin_address: Option<String>,

    /// Directory holding workload certificates
    pub auth_certs_path: String,

    /// Authentication between proxies and the control plane
    pub control_plane_auth_policy: ControlPlaneAuthPolicy,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            proxy_listen_port: 15001,
            proxy_http_port: 0,
            connect_timeout_ms: 1000,
            rds_refresh_delay_ms: 1000,
            discovery_address: "discovery.mesh-system:15003".to_string(),
            mixer_check_server: None,
            mixer_report_server: None,
            disable_policy_checks: false,
            access_log_file: None,
            enable_tracing: false,
            zipkin_address: None,
            auth_certs_path: "/etc/certs/".to_string(),
            control_plane_auth_policy: ControlPlaneAuthPolicy::None,
        }
    }
}

impl MeshConfig {
    /// Whether a policy/telemetry backend is configured
    pub fn policy_enabled(&self) -> bool {
        self.mixer_check_server.as_deref().is_some_and(|s| !s.is_empty())
            || self.mixer_report_server.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Whether redirected traffic capture is configured
    pub fn capture_enabled(&self) -> bool {
        self.proxy_listen_port > 0
    }

    /// Checks the validator crate cannot express
    fn validate_custom(&self) -> Result<()> {
        if self.proxy_listen_port != 0 && self.proxy_listen_port == self.proxy_http_port {
            return Err(Error::validation_field(
                "Capture port and HTTP proxy port cannot be the same",
                "proxy_http_port",
            ));
        }

        if self.control_plane_auth_policy == ControlPlaneAuthPolicy::MutualTls
            && self.auth_certs_path.trim().is_empty()
        {
            return Err(Error::validation_field(
                "Mutual TLS to the control plane requires a certificate directory",
                "auth_certs_path",
            ));
        }

        Ok(())
    }
}

/// Options passed explicitly into every compiler entrypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Ask the proxy to validate that every route references a known cluster
    pub validate_clusters: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { validate_clusters: true }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}
