//! Request handlers bound to endpoints.
//!
//! Every endpoint holds one [`ActionHandler`]. The defaults for the standard
//! operations live here; access-controlled variants live in
//! [`crate::access`].

pub mod gsp;
pub mod query;
pub mod update;

pub use gsp::{GraphReadHandler, GraphStoreHandler};
pub use query::QueryHandler;
pub use update::{UpdateHandler, UploadHandler};

use async_trait::async_trait;
use triplegate_core::{GraphName, Quad};

use super::action::{ActionError, ActionMethod, ActionRequest, ActionResponse};
use crate::traits::DatasetGraph;

/// Handles one incoming request against a dataset.
///
/// Handlers are shared by every request reaching their endpoint, so they
/// hold no per-request state.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Execute the request. The outcome is returned to the caller verbatim.
    async fn execute(
        &self,
        request: ActionRequest,
        dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError>;
}

/// Handler for the `no-op` operation.
pub struct NoOpHandler;

#[async_trait]
impl ActionHandler for NoOpHandler {
    fn name(&self) -> &'static str {
        "no-op"
    }

    async fn execute(
        &self,
        _request: ActionRequest,
        _dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        Ok(ActionResponse::Empty)
    }
}

/// Rejects methods outside `allowed` with `MethodNotAllowed`.
pub(crate) fn require_method(
    request: &ActionRequest,
    allowed: &[ActionMethod],
    handler: &'static str,
) -> Result<(), ActionError> {
    if allowed.contains(&request.method) {
        Ok(())
    } else {
        Err(ActionError::MethodNotAllowed {
            method: request.method,
            handler,
        })
    }
}

/// Moves every quad into `graph`.
pub(crate) fn relocate(quads: Vec<Quad>, graph: &GraphName) -> Vec<Quad> {
    quads
        .into_iter()
        .map(|q| Quad {
            graph: graph.clone(),
            ..q
        })
        .collect()
}
