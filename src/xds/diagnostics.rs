//! Pass diagnostics
//!
//! Unsupported configuration never fails a compilation. The offending element is
//! skipped, a log line is emitted and a [`Diagnostic`] is recorded so callers can
//! inspect what was left out.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Port protocol the traffic direction cannot express
    UnsupportedProtocol,
    /// A second service claimed an already-taken wildcard TCP port
    DuplicateWildcardPort,
    /// Redis table with several routes fell back to plain TCP forwarding
    RedisMultiRoute,
    /// Management listener dropped because a service listener owns its address
    ManagementCollision,
    /// Egress rule rejected by conflict validation
    RejectedEgressRule,
    /// Two differently named listeners share one address
    ListenerAddressCollision,
    /// Virtual host domain already claimed within the same route table
    OverlappingDomain,
    /// Cluster name reused with a different definition
    ConflictingCluster,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::UnsupportedProtocol => "unsupported_protocol",
            DiagnosticKind::DuplicateWildcardPort => "duplicate_wildcard_port",
            DiagnosticKind::RedisMultiRoute => "redis_multi_route",
            DiagnosticKind::ManagementCollision => "management_collision",
            DiagnosticKind::RejectedEgressRule => "rejected_egress_rule",
            DiagnosticKind::ListenerAddressCollision => "listener_address_collision",
            DiagnosticKind::OverlappingDomain => "overlapping_domain",
            DiagnosticKind::ConflictingCluster => "conflicting_cluster",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Ordered diagnostic sink for one compilation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and keep a diagnostic
    pub fn record(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            DiagnosticKind::UnsupportedProtocol | DiagnosticKind::DuplicateWildcardPort => {
                tracing::debug!(kind = %kind, "{}", message)
            }
            _ => tracing::warn!(kind = %kind, "{}", message),
        }
        self.entries.push(Diagnostic { kind, message });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
