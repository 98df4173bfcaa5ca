//! Configuration-class errors: fatal to startup, never a runtime fallback.

/// Errors raised while building the routing core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no handler registered for operation '{operation}'")]
    UnresolvedOperation { operation: String },
    #[error("unknown operation '{id}'")]
    UnknownOperation { id: String },
    #[error("dataset '{name}' is already registered")]
    DuplicateDataset { name: String },
    #[error("dataset '{dataset}' declares endpoint '{endpoint}' twice")]
    DuplicateEndpoint { dataset: String, endpoint: String },
    #[error("dataset '{dataset}' cannot {action} while {state}")]
    InvalidState {
        dataset: String,
        state: &'static str,
        action: &'static str,
    },
    #[error("endpoint '{endpoint}' is sealed; handlers are fixed once its dataset is active")]
    EndpointSealed { endpoint: String },
    #[error("missing configuration: {0}")]
    Missing(String),
}
