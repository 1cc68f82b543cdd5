//! Proxy configuration compilation
//!
//! Builds the Envoy listeners, clusters and route tables for one proxy node:
//! - Inbound listeners for co-located service instances
//! - Outbound HTTP route tables and TCP listeners for every mesh service
//! - Egress virtual hosts and listeners for external destinations
//! - Management listeners for health and readiness probes
//!
//! The compiled model is plain data; [`conversion`] renders it as Envoy v3 resources.

pub mod cluster;
pub mod compiler;
pub mod conversion;
pub mod diagnostics;
pub mod egress;
pub mod filters;
pub mod inbound;
pub mod listener;
pub mod management;
pub mod outbound;
pub mod plugins;
pub mod route;

pub use cluster::{Cluster, ClusterType, LbType, SslContext};
pub use compiler::{CompilePass, CompiledConfig, ConfigCompiler};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use filters::HttpFilter;
pub use listener::{Listener, NetworkFilter, NetworkFilterConfig};
pub use plugins::{AuthnPolicyResolver, ConfigStore, Environment, PayloadBuilder, ServiceDiscovery};
pub use route::{HttpRoute, HttpRouteConfig, HttpRouteConfigs, VirtualHost, RDS_ALL};
