//! Integration tests for configuration loading
//!
//! Defaults, a configuration file and `FLOWMESH_` environment overrides are layered
//! in that order.

use flowmesh::config::{load_config, ControlPlaneAuthPolicy};
use flowmesh::Result;
use std::env;
use std::io::Write;
use std::sync::Mutex;

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let file = config_file("mesh:\n  proxy_http_port: 15080\n  connect_timeout_ms: 250\n");

    env::set_var("FLOWMESH_MESH__PROXY_HTTP_PORT", "15081");
    let result = load_config(Some(file.path()));
    env::remove_var("FLOWMESH_MESH__PROXY_HTTP_PORT");

    let config = result?;
    assert_eq!(config.mesh.proxy_http_port, 15081);
    assert_eq!(config.mesh.connect_timeout_ms, 250);
    Ok(())
}

#[test]
fn test_compile_options_from_file() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let file = config_file(
        "compile:\n  validate_clusters: false\nmesh:\n  control_plane_auth_policy: MUTUAL_TLS\n",
    );

    let config = load_config(Some(file.path()))?;
    assert!(!config.compile.validate_clusters);
    assert_eq!(config.mesh.control_plane_auth_policy, ControlPlaneAuthPolicy::MutualTls);
    Ok(())
}

#[test]
fn test_invalid_configuration_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();

    let file = config_file("mesh:\n  proxy_listen_port: 15001\n  proxy_http_port: 15001\n");
    assert!(load_config(Some(file.path())).is_err());

    let file = config_file("mesh:\n  connect_timeout_ms: 0\n");
    assert!(load_config(Some(file.path())).is_err());

    let missing = std::path::Path::new("/nonexistent/flowmesh.yaml");
    assert!(load_config(Some(missing)).is_err());
}
