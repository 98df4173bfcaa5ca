use std::fmt;

use serde::{Deserialize, Serialize};

/// Graph a quad belongs to: the unnamed default graph or a named graph IRI.
///
/// Serializes as `null` for the default graph and as the IRI string otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum GraphName {
    /// The dataset's default graph.
    #[default]
    Default,
    /// A named graph identified by IRI.
    Named(String),
}

impl GraphName {
    /// Convenience constructor for a named graph.
    #[must_use]
    pub fn named(iri: impl Into<String>) -> Self {
        Self::Named(iri.into())
    }

    /// Returns `true` for the default graph.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl From<Option<String>> for GraphName {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Default, Self::Named)
    }
}

impl From<GraphName> for Option<String> {
    fn from(value: GraphName) -> Self {
        match value {
            GraphName::Default => None,
            GraphName::Named(iri) => Some(iri),
        }
    }
}

impl fmt::Display for GraphName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("<default>"),
            Self::Named(iri) => write!(f, "<{iri}>"),
        }
    }
}

/// One RDF statement together with the graph it is stored in.
///
/// Terms are kept in their serialized form; term parsing belongs to the
/// storage layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default)]
    pub graph: GraphName,
}

impl Quad {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        graph: GraphName,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            graph,
        }
    }
}

/// Quad pattern where every unset position matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadPattern {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    /// `None` matches quads in every graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphName>,
}

impl QuadPattern {
    /// Pattern matching every quad in the dataset.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Pattern matching every quad of one graph.
    #[must_use]
    pub fn in_graph(graph: GraphName) -> Self {
        Self {
            graph: Some(graph),
            ..Self::default()
        }
    }

    /// Tests a quad against this pattern.
    #[must_use]
    pub fn matches(&self, quad: &Quad) -> bool {
        fn term(slot: Option<&String>, value: &str) -> bool {
            slot.map_or(true, |s| s == value)
        }
        term(self.subject.as_ref(), &quad.subject)
            && term(self.predicate.as_ref(), &quad.predicate)
            && term(self.object.as_ref(), &quad.object)
            && self.graph.as_ref().map_or(true, |g| *g == quad.graph)
    }
}

/// Authentication principal resolved by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier for the authenticated entity (the user name).
    pub id: String,
    /// Roles assigned to this principal.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }
}
