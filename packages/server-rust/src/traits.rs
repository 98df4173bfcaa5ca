use std::sync::Arc;

use async_trait::async_trait;
use triplegate_core::{GraphName, Quad, QuadPattern, SecurityContext};

/// Storage engine behind one dataset.
///
/// The serving core only routes requests to handlers; everything that
/// touches data goes through this trait. Implementations: in-memory
/// ([`MemoryDataset`](crate::storage::MemoryDataset)), persistent stores
/// (future).
#[async_trait]
pub trait DatasetGraph: Send + Sync {
    /// All quads matching the pattern.
    async fn find(&self, pattern: &QuadPattern) -> anyhow::Result<Vec<Quad>>;

    /// Contents of a single graph. Missing graphs are empty.
    async fn graph(&self, graph: &GraphName) -> anyhow::Result<Vec<Quad>> {
        self.find(&QuadPattern::in_graph(graph.clone())).await
    }

    /// Names of the non-empty named graphs.
    async fn graph_names(&self) -> anyhow::Result<Vec<String>>;

    /// Adds quads. Returns how many were not already present.
    async fn insert(&self, quads: &[Quad]) -> anyhow::Result<usize>;

    /// Removes quads. Returns how many were present.
    async fn delete(&self, quads: &[Quad]) -> anyhow::Result<usize>;

    /// Removes every quad of one graph. Returns how many were removed.
    async fn clear_graph(&self, graph: &GraphName) -> anyhow::Result<usize>;

    /// Replaces a graph's contents with `quads`, which are all placed in
    /// `graph` regardless of their own graph field.
    async fn replace_graph(&self, graph: &GraphName, quads: &[Quad]) -> anyhow::Result<usize> {
        self.clear_graph(graph).await?;
        let relocated: Vec<Quad> = quads
            .iter()
            .map(|q| Quad {
                graph: graph.clone(),
                ..q.clone()
            })
            .collect();
        self.insert(&relocated).await
    }

    /// Per-identity authorization for this dataset, if it is access controlled.
    fn access_control(&self) -> Option<Arc<dyn AuthorizationService>> {
        None
    }

    /// Whether requests to this dataset must be filtered per identity.
    fn is_access_controlled(&self) -> bool {
        self.access_control().is_some()
    }

    /// Release resources. Called once when the owning dataset is removed.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Maps a request identity to what that identity may see.
///
/// `None` as the result means the identity has no access at all.
pub trait AuthorizationService: Send + Sync {
    fn security_context(&self, user: Option<&str>) -> Option<SecurityContext>;
}
