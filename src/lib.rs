//! # Flowmesh
//!
//! Flowmesh compiles service mesh state into per-proxy Envoy configuration. Given a
//! snapshot of registered services, their instances, routing rules and egress rules,
//! it produces the listeners, clusters and route tables one proxy node should run.
//!
//! ## Architecture
//!
//! ```text
//! Registry snapshot → ConfigCompiler → CompiledConfig / route tables → Envoy v3 protos
//!        ↓                  ↓
//!   Collaborator traits   Diagnostics
//! ```
//!
//! ## Core Components
//!
//! - **Domain**: services, instances, proxy nodes and user-authored rules
//! - **Compiler**: inbound, outbound, egress and management listener construction
//! - **Collaborators**: discovery, rule storage, authn policy and payload builders
//!   injected through [`xds::Environment`]
//! - **Conversion**: rendering of the compiled model as Envoy v3 resources
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use flowmesh::config::{CompileOptions, MeshConfig};
//! use flowmesh::domain::{NodeRole, Proxy};
//! use flowmesh::registry::MemoryRegistry;
//! use flowmesh::xds::{ConfigCompiler, Environment};
//! use std::sync::Arc;
//!
//! fn main() -> flowmesh::Result<()> {
//!     let registry = Arc::new(MemoryRegistry::from_path("registry.yaml".as_ref())?);
//!     let env = Environment::new(MeshConfig::default(), registry.clone(), registry);
//!     let node = Proxy::new(NodeRole::Sidecar, "app.default", "default.svc.cluster.local", "10.0.0.5");
//!
//!     let compiled = ConfigCompiler::new(env).compile(&node, &CompileOptions::default())?;
//!     println!("{} listeners", compiled.listeners.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod registry;
pub mod xds;

// Re-export commonly used types
pub use config::{AppConfig, CompileOptions, MeshConfig};
pub use errors::{Error, Result};
pub use xds::{CompiledConfig, ConfigCompiler, Environment};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
