//! # Error Handling
//!
//! Error types for the flowmesh configuration compiler, built with `thiserror`.
//!
//! Only upstream failures and request-level mistakes surface as errors. Unsupported
//! mesh configuration (unknown protocols, port collisions, conflicting egress rules)
//! is handled by omission and reported through [`crate::xds::Diagnostic`] records.

/// Custom result type for flowmesh operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the flowmesh compiler
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Service discovery failures (services, instances, management ports)
    #[error("Service discovery error: {0}")]
    Discovery(String),

    /// Routing or egress rule store failures
    #[error("Rule store error: {0}")]
    RuleStore(String),

    /// The node role cannot serve the requested operation
    #[error("Unsupported node role {role} for {operation}")]
    UnsupportedRole { operation: String, role: String },

    /// A route table name that is neither the sentinel nor a port number
    #[error("Invalid route table name '{0}'")]
    InvalidRouteName(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a service discovery error
    pub fn discovery<S: Into<String>>(message: S) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a rule store error
    pub fn rule_store<S: Into<String>>(message: S) -> Self {
        Self::RuleStore(message.into())
    }

    /// Create an unsupported role error
    pub fn unsupported_role<O: Into<String>, R: ToString>(operation: O, role: R) -> Self {
        Self::UnsupportedRole { operation: operation.into(), role: role.to_string() }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the failure came from a collaborator and a later retry may succeed
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Discovery(_) | Error::RuleStore(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect();
        fields.sort();

        Self::validation(format!("Validation failed: {}", fields.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = Error::config("Test configuration error");
        assert!(matches!(error, Error::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
    }

    #[test]
    fn test_validation_error() {
        let error = Error::validation_field("must be positive", "connect_timeout_ms");
        if let Error::Validation { field, .. } = error {
            assert_eq!(field, Some("connect_timeout_ms".to_string()));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_unsupported_role_message() {
        let error = Error::unsupported_role("route discovery", "management");
        assert_eq!(error.to_string(), "Unsupported node role management for route discovery");
    }

    #[test]
    fn test_upstream_classification() {
        assert!(Error::discovery("registry down").is_upstream());
        assert!(Error::rule_store("store down").is_upstream());
        assert!(!Error::InvalidRouteName("abc".into()).is_upstream());
        assert!(!Error::internal("boom").is_upstream());
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));

        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Serialization { .. }));
    }
}
