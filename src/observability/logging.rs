//! # Structured Logging
//!
//! Provides structured logging macros and subscriber setup using the tracing ecosystem.

use crate::config::ObservabilityConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span for a compilation pass or entrypoint call
#[macro_export]
macro_rules! compile_span {
    ($operation:expr, $node_id:expr) => {
        tracing::info_span!(
            "compile_operation",
            operation = %$operation,
            node_id = %$node_id
        )
    };
    ($operation:expr, $node_id:expr, $($field:tt)*) => {
        tracing::info_span!(
            "compile_operation",
            operation = %$operation,
            node_id = %$node_id,
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this more than once is harmless:
/// an already-installed subscriber (e.g. in integration tests) is kept.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json_logging {
        tracing::subscriber::set_global_default(
            fmt().json().with_env_filter(filter).with_writer(std::io::stderr).finish(),
        )
        .ok();
    } else {
        tracing::subscriber::set_global_default(
            fmt().with_env_filter(filter).with_writer(std::io::stderr).finish(),
        )
        .ok();
    }
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        capture_port = config.mesh.proxy_listen_port,
        http_proxy_port = config.mesh.proxy_http_port,
        connect_timeout_ms = config.mesh.connect_timeout_ms,
        policy_enabled = %config.mesh.policy_enabled(),
        tracing_enabled = %config.mesh.enable_tracing,
        validate_clusters = %config.compile.validate_clusters,
        "Flowmesh compiler configuration"
    );
}
