//! # Configuration Management
//!
//! Layers built-in defaults, an optional configuration file and `FLOWMESH_`
//! environment variables into an [`AppConfig`], then validates it.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `FLOWMESH_MESH__PROXY_HTTP_PORT=15080`.

pub mod settings;

pub use settings::{
    AppConfig, CompileOptions, ControlPlaneAuthPolicy, MeshConfig, ObservabilityConfig,
};

use crate::Result;
use std::path::Path;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "FLOWMESH";

/// Load and validate configuration
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder =
        config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

    if let Some(path) = path {
        if !path.exists() {
            return Err(crate::Error::config(format!(
                "Configuration file {} does not exist",
                path.display()
            )));
        }
        builder = builder.add_source(config::File::from(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let app_config: AppConfig = builder.build()?.try_deserialize()?;
    app_config.validate()?;

    tracing::debug!(
        capture_port = app_config.mesh.proxy_listen_port,
        http_proxy_port = app_config.mesh.proxy_http_port,
        policy_enabled = app_config.mesh.policy_enabled(),
        validate_clusters = app_config.compile.validate_clusters,
        "Loaded flowmesh configuration"
    );

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults() {
        let config = load_config(None).expect("defaults load");
        assert_eq!(config.mesh, MeshConfig::default());
        assert!(config.compile.validate_clusters);
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp file");
        writeln!(
            file,
            "mesh:\n  proxy_http_port: 15080\n  mixer_report_server: telemetry:9091\ncompile:\n  validate_clusters: false"
        )
        .expect("write config");

        let config = load_config(Some(file.path())).expect("file config loads");
        assert_eq!(config.mesh.proxy_http_port, 15080);
        assert_eq!(config.mesh.proxy_listen_port, 15001);
        assert!(config.mesh.policy_enabled());
        assert!(!config.compile.validate_clusters);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = load_config(Some(Path::new("/definitely/not/here.yaml")));
        assert!(matches!(result, Err(crate::Error::Config { .. })));
    }

    #[test]
    fn test_invalid_file_values_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp file");
        writeln!(file, "mesh:\n  connect_timeout_ms: 0").expect("write config");

        assert!(load_config(Some(file.path())).is_err());
    }
}
