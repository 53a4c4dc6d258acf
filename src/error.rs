//! Error types for registry, configuration, bootstrap and export failures.

use crate::export::BackendKind;
use crate::registry::MeterKind;
use thiserror::Error;

/// Result type alias for metrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Which half of the bootstrap sequence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// A registry configurer returned an error
    Configure,
    /// A meter binder returned an error
    Bind,
}

impl std::fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configure => f.write_str("configurer"),
            Self::Bind => f.write_str("binder"),
        }
    }
}

/// Errors raised by the registry, the bootstrap sequencer, configuration
/// loading and the export backends.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Meter name is empty or otherwise unusable
    #[error("Invalid meter name: {name:?}")]
    InvalidName { name: String },

    /// A meter with the same id already exists with another kind
    #[error("Meter {name} is already registered as a {existing}, not a {requested}")]
    MeterTypeConflict {
        name: String,
        existing: MeterKind,
        requested: MeterKind,
    },

    /// Required configuration key is absent
    #[error("Missing required configuration: {key}")]
    MissingConfig { key: String },

    /// Configuration value could not be parsed
    #[error("Invalid value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    /// A configurer or binder aborted startup
    #[error("Registry bootstrap failed in {phase} #{index}: {source}")]
    Bootstrap {
        phase: BootstrapPhase,
        index: usize,
        #[source]
        source: Box<MetricsError>,
    },

    /// Publishing to a backend failed
    #[error("Export to {backend} failed: {message}")]
    Export { backend: BackendKind, message: String },

    /// Logging could not be initialised
    #[error("Observability setup failed: {0}")]
    Observability(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MetricsError {
    /// Create a missing configuration error
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// Create an invalid configuration error
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an export error for a backend
    pub fn export(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::Export {
            backend,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_error_message_names_phase() {
        let err = MetricsError::Bootstrap {
            phase: BootstrapPhase::Bind,
            index: 2,
            source: Box::new(MetricsError::invalid("x", "bad")),
        };
        assert_eq!(
            err.to_string(),
            "Registry bootstrap failed in binder #2: Invalid value for x: bad"
        );
    }

    #[test]
    fn test_type_conflict_message() {
        let err = MetricsError::MeterTypeConflict {
            name: "jobs".into(),
            existing: MeterKind::Counter,
            requested: MeterKind::Timer,
        };
        assert_eq!(
            err.to_string(),
            "Meter jobs is already registered as a counter, not a timer"
        );
    }
}
