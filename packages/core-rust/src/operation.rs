//! Operation tags: the capability kinds a dataset endpoint can expose.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// Immutable tag naming one capability (query, update, graph store, ...).
///
/// Two operations are the same operation when their identifiers are equal;
/// the description is informational and does not take part in comparison.
/// The standard set is available as associated constants, and server
/// extensions may create further operations at startup with [`Operation::new`].
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    id: Cow<'static, str>,
    description: Cow<'static, str>,
}

impl Operation {
    /// SPARQL query.
    pub const QUERY: Operation = Operation::from_static("query", "SPARQL Query");
    /// SPARQL update.
    pub const UPDATE: Operation = Operation::from_static("update", "SPARQL Update");
    /// Bulk data upload.
    pub const UPLOAD: Operation = Operation::from_static("upload", "File Upload");
    /// Graph store protocol, read only.
    pub const GSP_R: Operation =
        Operation::from_static("gsp-r", "Graph Store Protocol (Read)");
    /// Graph store protocol, read and write.
    pub const GSP_RW: Operation = Operation::from_static("gsp-rw", "Graph Store Protocol");
    /// Placeholder endpoint that does nothing.
    pub const NO_OP: Operation = Operation::from_static("no-op", "No Op");

    /// Builds an operation from static strings. Usable in `const` context.
    #[must_use]
    pub const fn from_static(id: &'static str, description: &'static str) -> Self {
        Self {
            id: Cow::Borrowed(id),
            description: Cow::Borrowed(description),
        }
    }

    /// Builds an operation with runtime-provided strings.
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Cow::Owned(id.into()),
            description: Cow::Owned(description.into()),
        }
    }

    /// Stable identifier, unique across the process.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The operations every server registers on startup.
    #[must_use]
    pub fn standard() -> [Operation; 6] {
        [
            Self::QUERY,
            Self::UPDATE,
            Self::UPLOAD,
            Self::GSP_R,
            Self::GSP_RW,
            Self::NO_OP,
        ]
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Operation {}

impl Hash for Operation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equality_ignores_description() {
        let custom = Operation::new("query", "something else entirely");
        assert_eq!(custom, Operation::QUERY);
        assert_ne!(Operation::GSP_R, Operation::GSP_RW);
    }

    #[test]
    fn standard_set_has_unique_ids() {
        let ids: HashSet<_> = Operation::standard()
            .iter()
            .map(|op| op.id().to_string())
            .collect();
        assert_eq!(ids.len(), 6);
        assert!(ids.contains("upload"));
    }

    #[test]
    fn display_uses_identifier() {
        assert_eq!(Operation::UPLOAD.to_string(), "upload");
        assert_eq!(Operation::UPLOAD.description(), "File Upload");
    }

    #[test]
    fn serializes_id_and_description() {
        let json = serde_json::to_value(Operation::GSP_RW).unwrap();
        assert_eq!(json["id"], "gsp-rw");
        assert_eq!(json["description"], "Graph Store Protocol");
    }
}
