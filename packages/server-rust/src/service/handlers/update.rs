use async_trait::async_trait;

use super::{relocate, require_method, ActionHandler};
use crate::service::action::{ActionBody, ActionError, ActionMethod, ActionRequest, ActionResponse};
use crate::traits::DatasetGraph;

/// Default handler for the `update` operation.
///
/// Applies the change set's deletions, then its insertions.
pub struct UpdateHandler;

#[async_trait]
impl ActionHandler for UpdateHandler {
    fn name(&self) -> &'static str {
        "update"
    }

    async fn execute(
        &self,
        request: ActionRequest,
        dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        require_method(&request, &[ActionMethod::Post], self.name())?;
        let ActionBody::Update(update) = request.body else {
            return Err(ActionError::BadRequest(
                "update expects an insert/delete change set".to_string(),
            ));
        };
        let deleted = dataset.delete(&update.delete).await?;
        let inserted = dataset.insert(&update.insert).await?;
        Ok(ActionResponse::Modified { inserted, deleted })
    }
}

/// Default handler for the `upload` operation.
///
/// Quads go into the graph named by the request when one is given,
/// otherwise into the graph each quad names.
pub struct UploadHandler;

#[async_trait]
impl ActionHandler for UploadHandler {
    fn name(&self) -> &'static str {
        "upload"
    }

    async fn execute(
        &self,
        request: ActionRequest,
        dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        require_method(&request, &[ActionMethod::Post], self.name())?;
        let ActionBody::Quads(quads) = request.body else {
            return Err(ActionError::BadRequest("upload expects quads".to_string()));
        };
        let quads = match &request.graph {
            Some(graph) => relocate(quads, graph),
            None => quads,
        };
        let inserted = dataset.insert(&quads).await?;
        Ok(ActionResponse::Modified {
            inserted,
            deleted: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use triplegate_core::{GraphName, Quad, RequestContext};

    use super::*;
    use crate::service::action::UpdateRequest;
    use crate::storage::MemoryDataset;

    fn quad(s: &str) -> Quad {
        Quad::new(s, "ex:p", "ex:o", GraphName::Default)
    }

    #[tokio::test]
    async fn update_deletes_then_inserts() {
        let ds = MemoryDataset::new().with_quads([quad("ex:old")]);
        let req = ActionRequest::new(RequestContext::new("ds", "update"), ActionMethod::Post)
            .with_body(ActionBody::Update(UpdateRequest {
                delete: vec![quad("ex:old")],
                insert: vec![quad("ex:new"), quad("ex:newer")],
            }));
        let resp = UpdateHandler.execute(req, &ds).await.unwrap();
        assert_eq!(
            resp,
            ActionResponse::Modified {
                inserted: 2,
                deleted: 1
            }
        );
        assert_eq!(ds.len(), 2);
    }

    #[tokio::test]
    async fn update_requires_change_set() {
        let ds = MemoryDataset::new();
        let req = ActionRequest::new(RequestContext::new("ds", "update"), ActionMethod::Post);
        let err = UpdateHandler.execute(req, &ds).await.unwrap_err();
        assert!(matches!(err, ActionError::BadRequest(_)));
    }

    #[tokio::test]
    async fn upload_into_named_graph() {
        let ds = MemoryDataset::new();
        let g = GraphName::named("http://g/upload");
        let req = ActionRequest::new(RequestContext::new("ds", "upload"), ActionMethod::Post)
            .with_graph(g.clone())
            .with_body(ActionBody::Quads(vec![quad("ex:a"), quad("ex:b")]));
        let resp = UploadHandler.execute(req, &ds).await.unwrap();
        assert_eq!(
            resp,
            ActionResponse::Modified {
                inserted: 2,
                deleted: 0
            }
        );
        assert_eq!(ds.graph(&g).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upload_rejects_get() {
        let ds = MemoryDataset::new();
        let req = ActionRequest::new(RequestContext::new("ds", "upload"), ActionMethod::Get);
        let err = UploadHandler.execute(req, &ds).await.unwrap_err();
        assert!(matches!(err, ActionError::MethodNotAllowed { .. }));
    }
}
