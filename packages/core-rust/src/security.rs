//! Per-identity visibility rules for access-controlled datasets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{GraphName, Quad};

/// The set of graphs one identity is allowed to read.
///
/// A context either grants every graph (`all_graphs`) or lists the named
/// graphs that are visible, with a separate switch for the default graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    #[serde(default)]
    pub all_graphs: bool,
    #[serde(default)]
    pub default_graph: bool,
    #[serde(default)]
    pub graphs: BTreeSet<String>,
}

impl SecurityContext {
    /// Context that sees every graph in the dataset.
    #[must_use]
    pub fn all() -> Self {
        Self {
            all_graphs: true,
            default_graph: true,
            graphs: BTreeSet::new(),
        }
    }

    /// Context that sees nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Context that sees the listed named graphs only.
    #[must_use]
    pub fn graphs<I, S>(graphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            graphs: graphs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Also grants the default graph.
    #[must_use]
    pub fn with_default_graph(mut self) -> Self {
        self.default_graph = true;
        self
    }

    #[must_use]
    pub fn is_visible(&self, graph: &GraphName) -> bool {
        if self.all_graphs {
            return true;
        }
        match graph {
            GraphName::Default => self.default_graph,
            GraphName::Named(iri) => self.graphs.contains(iri),
        }
    }

    /// Keeps only the quads whose graph is visible.
    #[must_use]
    pub fn filter(&self, quads: Vec<Quad>) -> Vec<Quad> {
        if self.all_graphs {
            return quads;
        }
        quads
            .into_iter()
            .filter(|q| self.is_visible(&q.graph))
            .collect()
    }
}
