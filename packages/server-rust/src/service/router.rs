//! Request routing: resolves dataset and endpoint names to the bound handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::debug;

use super::access_point::DataAccessPointRegistry;
use super::action::{ActionError, ActionRequest, ActionResponse};

type BoxedFuture = Pin<Box<dyn Future<Output = Result<ActionResponse, ActionError>> + Send>>;

// ---------------------------------------------------------------------------
// ActionRouter
// ---------------------------------------------------------------------------

/// Routes `ActionRequest` values to the handler bound to
/// `ctx.dataset` / `ctx.endpoint`.
///
/// Only the access point registry and the endpoint's current handler are
/// consulted. Datasets that are absent or not yet active return
/// `ActionError::DatasetNotFound`; unknown endpoints, or endpoints without a
/// handler, return `ActionError::EndpointNotFound`. The handler's outcome is
/// returned unchanged.
#[derive(Clone)]
pub struct ActionRouter {
    registry: Arc<DataAccessPointRegistry>,
}

impl ActionRouter {
    #[must_use]
    pub fn new(registry: Arc<DataAccessPointRegistry>) -> Self {
        Self { registry }
    }
}

impl Service<ActionRequest> for ActionRouter {
    type Response = ActionResponse;
    type Error = ActionError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ActionRequest) -> Self::Future {
        let access_point = self.registry.get(&request.ctx.dataset);
        Box::pin(async move {
            let service = match access_point {
                Some(dap) if dap.data_service().is_active() => Arc::clone(dap.data_service()),
                _ => {
                    return Err(ActionError::DatasetNotFound {
                        name: request.ctx.dataset,
                    })
                }
            };

            let handler = service
                .endpoint(&request.ctx.endpoint)
                .and_then(|endpoint| endpoint.handler())
                .ok_or_else(|| ActionError::EndpointNotFound {
                    dataset: request.ctx.dataset.clone(),
                    endpoint: request.ctx.endpoint.clone(),
                })?;

            debug!(
                dataset = %request.ctx.dataset,
                endpoint = %request.ctx.endpoint,
                handler = handler.name(),
                "dispatching request"
            );
            handler.execute(request, service.dataset().as_ref()).await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
