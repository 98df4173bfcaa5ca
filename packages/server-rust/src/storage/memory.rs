//! In-memory [`DatasetGraph`] implementation.
//!
//! Suitable for development, testing, and small datasets that fit in memory.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use triplegate_core::{GraphName, Quad, QuadPattern};

use crate::traits::{AuthorizationService, DatasetGraph};

/// Quad store held in a single ordered set behind a readers-writer lock.
///
/// Readers proceed concurrently; writers take the lock only for the
/// duration of the set mutation.
pub struct MemoryDataset {
    quads: RwLock<BTreeSet<Quad>>,
    authorization: Option<Arc<dyn AuthorizationService>>,
    closed: AtomicBool,
}

impl MemoryDataset {
    /// Creates an empty dataset without access control.
    #[must_use]
    pub fn new() -> Self {
        Self {
            quads: RwLock::new(BTreeSet::new()),
            authorization: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates an empty dataset whose reads are filtered through `authorization`.
    #[must_use]
    pub fn access_controlled(authorization: Arc<dyn AuthorizationService>) -> Self {
        Self {
            authorization: Some(authorization),
            ..Self::new()
        }
    }

    /// Seeds the dataset, builder style.
    #[must_use]
    pub fn with_quads(self, quads: impl IntoIterator<Item = Quad>) -> Self {
        self.quads.write().extend(quads);
        self
    }

    /// Number of stored quads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quads.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quads.read().is_empty()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        if self.is_closed() {
            anyhow::bail!("dataset has been closed");
        }
        Ok(())
    }
}

impl Default for MemoryDataset {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetGraph for MemoryDataset {
    async fn find(&self, pattern: &QuadPattern) -> anyhow::Result<Vec<Quad>> {
        self.ensure_open()?;
        Ok(self
            .quads
            .read()
            .iter()
            .filter(|q| pattern.matches(q))
            .cloned()
            .collect())
    }

    async fn graph_names(&self) -> anyhow::Result<Vec<String>> {
        self.ensure_open()?;
        let names: BTreeSet<String> = self
            .quads
            .read()
            .iter()
            .filter_map(|q| match &q.graph {
                GraphName::Named(iri) => Some(iri.clone()),
                GraphName::Default => None,
            })
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn insert(&self, quads: &[Quad]) -> anyhow::Result<usize> {
        self.ensure_open()?;
        let mut store = self.quads.write();
        Ok(quads.iter().filter(|q| store.insert((*q).clone())).count())
    }

    async fn delete(&self, quads: &[Quad]) -> anyhow::Result<usize> {
        self.ensure_open()?;
        let mut store = self.quads.write();
        Ok(quads.iter().filter(|q| store.remove(*q)).count())
    }

    async fn clear_graph(&self, graph: &GraphName) -> anyhow::Result<usize> {
        self.ensure_open()?;
        let mut store = self.quads.write();
        let before = store.len();
        store.retain(|q| q.graph != *graph);
        Ok(before - store.len())
    }

    fn access_control(&self) -> Option<Arc<dyn AuthorizationService>> {
        self.authorization.clone()
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::Release);
        self.quads.write().clear();
        Ok(())
    }
}
