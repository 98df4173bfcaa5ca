//! Graph store protocol handlers: whole-graph read, replace, merge, and clear.

use async_trait::async_trait;

use super::{relocate, require_method, ActionHandler};
use crate::service::action::{ActionBody, ActionError, ActionMethod, ActionRequest, ActionResponse};
use crate::traits::DatasetGraph;

/// Default handler for `gsp-r`: GET of one graph.
pub struct GraphReadHandler;

#[async_trait]
impl ActionHandler for GraphReadHandler {
    fn name(&self) -> &'static str {
        "gsp-r"
    }

    async fn execute(
        &self,
        request: ActionRequest,
        dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        require_method(&request, &[ActionMethod::Get], self.name())?;
        let quads = dataset.graph(&request.target_graph()).await?;
        Ok(ActionResponse::Quads { quads })
    }
}

/// Default handler for `gsp-rw`.
///
/// - GET: read the graph
/// - PUT: replace the graph with the body
/// - POST: merge the body into the graph
/// - DELETE: clear the graph
pub struct GraphStoreHandler;

fn body_quads(body: ActionBody) -> Result<Vec<triplegate_core::Quad>, ActionError> {
    match body {
        ActionBody::Quads(quads) => Ok(quads),
        ActionBody::Empty => Ok(Vec::new()),
        ActionBody::Pattern(_) | ActionBody::Update(_) => Err(ActionError::BadRequest(
            "graph store writes expect quads".to_string(),
        )),
    }
}

#[async_trait]
impl ActionHandler for GraphStoreHandler {
    fn name(&self) -> &'static str {
        "gsp-rw"
    }

    async fn execute(
        &self,
        request: ActionRequest,
        dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        let graph = request.target_graph();
        match request.method {
            ActionMethod::Get => GraphReadHandler.execute(request, dataset).await,
            ActionMethod::Put => {
                let quads = body_quads(request.body)?;
                let deleted = dataset.graph(&graph).await?.len();
                let inserted = dataset.replace_graph(&graph, &quads).await?;
                Ok(ActionResponse::Modified { inserted, deleted })
            }
            ActionMethod::Post => {
                let quads = relocate(body_quads(request.body)?, &graph);
                let inserted = dataset.insert(&quads).await?;
                Ok(ActionResponse::Modified {
                    inserted,
                    deleted: 0,
                })
            }
            ActionMethod::Delete => {
                let deleted = dataset.clear_graph(&graph).await?;
                Ok(ActionResponse::Modified {
                    inserted: 0,
                    deleted,
                })
            }
        }
    }
}
