//! Operation → default handler registry.

use std::sync::Arc;

use dashmap::DashMap;
use triplegate_core::Operation;

use super::error::ConfigError;
use super::handlers::{
    ActionHandler, GraphReadHandler, GraphStoreHandler, NoOpHandler, QueryHandler,
    UpdateHandler, UploadHandler,
};

/// One registry entry: the operation tag and the handler endpoints bound to
/// it receive unless configuration names another.
#[derive(Clone)]
struct OperationEntry {
    operation: Operation,
    handler: Arc<dyn ActionHandler>,
}

/// Registry contents captured by [`OperationRegistry::checkpoint`].
pub struct Checkpoint(Vec<(String, OperationEntry)>);

/// Maps operation identifiers to their default handler.
///
/// Built once at startup with [`OperationRegistry::standard`]; server
/// modules may add entries from their `configure` hook. After startup the
/// registry is only read.
pub struct OperationRegistry {
    entries: DashMap<String, OperationEntry>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Creates a registry holding the built-in operations and their handlers.
    #[must_use]
    pub fn standard() -> Self {
        let registry = Self::new();
        registry.register(Operation::QUERY, Arc::new(QueryHandler));
        registry.register(Operation::UPDATE, Arc::new(UpdateHandler));
        registry.register(Operation::UPLOAD, Arc::new(UploadHandler));
        registry.register(Operation::GSP_R, Arc::new(GraphReadHandler));
        registry.register(Operation::GSP_RW, Arc::new(GraphStoreHandler));
        registry.register(Operation::NO_OP, Arc::new(NoOpHandler));
        registry
    }

    /// Adds an entry, replacing any handler previously registered for the
    /// same operation.
    pub fn register(&self, operation: Operation, handler: Arc<dyn ActionHandler>) {
        tracing::debug!(
            operation = operation.id(),
            handler = handler.name(),
            "registering operation"
        );
        self.entries.insert(
            operation.id().to_string(),
            OperationEntry { operation, handler },
        );
    }

    /// Returns the default handler for `operation`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnresolvedOperation` if nothing is registered.
    pub fn resolve(&self, operation: &Operation) -> Result<Arc<dyn ActionHandler>, ConfigError> {
        self.entries
            .get(operation.id())
            .map(|entry| Arc::clone(&entry.handler))
            .ok_or_else(|| ConfigError::UnresolvedOperation {
                operation: operation.id().to_string(),
            })
    }

    /// Looks up a registered operation by identifier, as used by configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownOperation` for an unregistered identifier.
    pub fn operation(&self, id: &str) -> Result<Operation, ConfigError> {
        self.entries
            .get(id)
            .map(|entry| entry.operation.clone())
            .ok_or_else(|| ConfigError::UnknownOperation { id: id.to_string() })
    }

    /// Captures the current entries so a failed module configuration can
    /// be undone with [`restore`](Self::restore).
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(
            self.entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        )
    }

    /// Replaces every entry with the ones captured in `checkpoint`.
    pub fn restore(&self, checkpoint: Checkpoint) {
        self.entries.clear();
        for (id, entry) in checkpoint.0 {
            self.entries.insert(id, entry);
        }
    }

    #[must_use]
    pub fn contains(&self, operation: &Operation) -> bool {
        self.entries.contains_key(operation.id())
    }

    /// All registered operations, ordered by identifier.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        let mut ops: Vec<Operation> = self
            .entries
            .iter()
            .map(|entry| entry.operation.clone())
            .collect();
        ops.sort_by(|a, b| a.id().cmp(b.id()));
        ops
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_resolves_every_builtin() {
        let registry = OperationRegistry::standard();
        for op in Operation::standard() {
            assert!(registry.resolve(&op).is_ok(), "{op} unresolved");
        }
        assert_eq!(registry.resolve(&Operation::GSP_RW).unwrap().name(), "gsp-rw");
    }

    #[test]
    fn unresolved_operation_is_a_config_error() {
        let registry = OperationRegistry::standard();
        let shacl = Operation::new("shacl", "SHACL Validation");
        let err = registry.resolve(&shacl).err().unwrap();
        assert_eq!(
            err,
            ConfigError::UnresolvedOperation {
                operation: "shacl".to_string()
            }
        );
    }

    #[test]
    fn register_overwrites() {
        let registry = OperationRegistry::standard();
        registry.register(Operation::QUERY, Arc::new(NoOpHandler));
        assert_eq!(registry.resolve(&Operation::QUERY).unwrap().name(), "no-op");
    }

    #[test]
    fn lookup_by_identifier() {
        let registry = OperationRegistry::standard();
        assert_eq!(registry.operation("gsp-r").unwrap(), Operation::GSP_R);
        assert!(matches!(
            registry.operation("sparql-star"),
            Err(ConfigError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn extension_operations_are_listed() {
        let registry = OperationRegistry::standard();
        registry.register(Operation::new("prefixes", "Prefix Service"), Arc::new(NoOpHandler));
        let ids: Vec<String> = registry
            .operations()
            .iter()
            .map(|op| op.id().to_string())
            .collect();
        assert_eq!(
            ids,
            vec!["gsp-r", "gsp-rw", "no-op", "prefixes", "query", "update", "upload"]
        );
    }

    #[test]
    fn restore_undoes_later_registrations() {
        let registry = OperationRegistry::standard();
        let checkpoint = registry.checkpoint();

        registry.register(Operation::new("prefixes", "Prefix Service"), Arc::new(NoOpHandler));
        registry.register(Operation::QUERY, Arc::new(NoOpHandler));
        registry.restore(checkpoint);

        assert!(registry.operation("prefixes").is_err());
        assert_eq!(registry.resolve(&Operation::QUERY).unwrap().name(), "query");
        assert_eq!(registry.operations().len(), 6);
    }
}
