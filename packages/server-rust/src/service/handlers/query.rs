use async_trait::async_trait;
use triplegate_core::QuadPattern;

use super::{require_method, ActionHandler};
use crate::service::action::{ActionBody, ActionError, ActionMethod, ActionRequest, ActionResponse};
use crate::traits::DatasetGraph;

/// Default handler for the `query` operation: pattern match over the whole dataset.
pub struct QueryHandler;

/// Extracts the query pattern from a request body. An empty body queries everything.
pub(crate) fn query_pattern(request: &ActionRequest) -> Result<QuadPattern, ActionError> {
    match &request.body {
        ActionBody::Empty => Ok(QuadPattern::any()),
        ActionBody::Pattern(pattern) => Ok(pattern.clone()),
        ActionBody::Quads(_) | ActionBody::Update(_) => Err(ActionError::BadRequest(
            "query expects a quad pattern".to_string(),
        )),
    }
}

#[async_trait]
impl ActionHandler for QueryHandler {
    fn name(&self) -> &'static str {
        "query"
    }

    async fn execute(
        &self,
        request: ActionRequest,
        dataset: &dyn DatasetGraph,
    ) -> Result<ActionResponse, ActionError> {
        require_method(&request, &[ActionMethod::Get, ActionMethod::Post], self.name())?;
        let pattern = query_pattern(&request)?;
        let quads = dataset.find(&pattern).await?;
        Ok(ActionResponse::Quads { quads })
    }
}

#[cfg(test)]
mod tests {
    use triplegate_core::{GraphName, Quad, RequestContext};

    use super::*;
    use crate::service::action::UpdateRequest;
    use crate::storage::MemoryDataset;

    fn dataset() -> MemoryDataset {
        MemoryDataset::new().with_quads([
            Quad::new("ex:a", "ex:p", "1", GraphName::Default),
            Quad::new("ex:b", "ex:p", "2", GraphName::named("http://g")),
        ])
    }

    fn request(method: ActionMethod) -> ActionRequest {
        ActionRequest::new(RequestContext::new("ds", "sparql"), method)
    }

    #[tokio::test]
    async fn empty_body_returns_everything() {
        let resp = QueryHandler
            .execute(request(ActionMethod::Get), &dataset())
            .await
            .unwrap();
        assert!(matches!(resp, ActionResponse::Quads { quads } if quads.len() == 2));
    }

    #[tokio::test]
    async fn pattern_restricts_results() {
        let req = request(ActionMethod::Post).with_body(ActionBody::Pattern(QuadPattern {
            subject: Some("ex:b".to_string()),
            ..QuadPattern::any()
        }));
        let resp = QueryHandler.execute(req, &dataset()).await.unwrap();
        let ActionResponse::Quads { quads } = resp else {
            panic!("expected quads");
        };
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].object, "2");
    }

    #[tokio::test]
    async fn rejects_update_body() {
        let req = request(ActionMethod::Post)
            .with_body(ActionBody::Update(UpdateRequest::default()));
        let err = QueryHandler.execute(req, &dataset()).await.unwrap_err();
        assert!(matches!(err, ActionError::BadRequest(_)));
    }

    #[tokio::test]
    async fn rejects_delete_method() {
        let err = QueryHandler
            .execute(request(ActionMethod::Delete), &dataset())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::MethodNotAllowed { .. }));
    }
}
